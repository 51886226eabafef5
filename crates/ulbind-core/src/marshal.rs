//! Conversion of native callback arguments into Rust values.

use std::borrow::Cow;

use crate::engine::{NativeRect, NativeStr};

/// Raised when an enumerated argument carries a code we do not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownCode {
    pub kind: &'static str,
    pub code: u32,
}

impl std::fmt::Display for UnknownCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} code {}", self.kind, self.code)
    }
}

// C-like enum mirrored from the engine headers, with a checked conversion
// from the raw `u32` that crosses the boundary.
macro_rules! native_enum {
    ($(#[$meta:meta])* $name:ident ($kind:literal) { $($variant:ident = $value:literal,)+ }) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }
        }

        impl TryFrom<u32> for $name {
            type Error = UnknownCode;

            fn try_from(code: u32) -> Result<Self, UnknownCode> {
                match code {
                    $($value => Ok(Self::$variant),)+
                    _ => Err(UnknownCode { kind: $kind, code }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

native_enum! {
    /// Mouse cursor requested by the page.
    Cursor ("cursor") {
        Pointer = 0,
        Cross = 1,
        Hand = 2,
        IBeam = 3,
        Wait = 4,
        Help = 5,
        EastResize = 6,
        NorthResize = 7,
        NorthEastResize = 8,
        NorthWestResize = 9,
        SouthResize = 10,
        SouthEastResize = 11,
        SouthWestResize = 12,
        WestResize = 13,
        NorthSouthResize = 14,
        EastWestResize = 15,
        NorthEastSouthWestResize = 16,
        NorthWestSouthEastResize = 17,
        ColumnResize = 18,
        RowResize = 19,
        MiddlePanning = 20,
        EastPanning = 21,
        NorthPanning = 22,
        NorthEastPanning = 23,
        NorthWestPanning = 24,
        SouthPanning = 25,
        SouthEastPanning = 26,
        SouthWestPanning = 27,
        WestPanning = 28,
        Move = 29,
        VerticalText = 30,
        Cell = 31,
        ContextMenu = 32,
        Alias = 33,
        Progress = 34,
        NoDrop = 35,
        Copy = 36,
        None = 37,
        NotAllowed = 38,
        ZoomIn = 39,
        ZoomOut = 40,
        Grab = 41,
        Grabbing = 42,
        Custom = 43,
    }
}

native_enum! {
    /// Subsystem a console message originated from.
    MessageSource ("message source") {
        Xml = 0,
        JavaScript = 1,
        Network = 2,
        ConsoleApi = 3,
        Storage = 4,
        AppCache = 5,
        Rendering = 6,
        Css = 7,
        Security = 8,
        ContentBlocker = 9,
        Other = 10,
    }
}

native_enum! {
    MessageLevel ("message level") {
        Log = 1,
        Warning = 2,
        Error = 3,
        Debug = 4,
        Info = 5,
    }
}

/// Integer rectangle in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl IntRect {
    /// `None` when the engine marked the rect invalid.
    pub fn from_native(rect: NativeRect) -> Option<IntRect> {
        rect.valid.then_some(IntRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        })
    }
}

/// A message the page wrote to its console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleMessage {
    pub source: MessageSource,
    pub level: MessageLevel,
    pub text: String,
    pub line: u64,
    pub column: u64,
    pub source_id: String,
}

/// Decode a borrowed native string. Invalid UTF-8 is replaced; the flag
/// reports whether that happened.
///
/// # Safety
/// See [`NativeStr::as_bytes`].
pub unsafe fn decode_str(value: NativeStr) -> (String, bool) {
    match String::from_utf8_lossy(value.as_bytes()) {
        Cow::Borrowed(s) => (s.to_owned(), false),
        Cow::Owned(s) => (s, true),
    }
}
