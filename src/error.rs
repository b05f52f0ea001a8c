#![allow(clippy::enum_variant_names)]

pub mod read {
    use std::error::Error;
    use std::fmt::Display;

    /// [Byte-stream reader/writer](crate::reader) failure causes.
    #[derive(Debug)]
    pub enum ReadCause {
        OutOfRange { pos: usize, len: usize },
        ScopedCursorOutOfRange { target: i64, len: usize },
        Utf8,
    }

    impl Display for ReadCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ReadCause::OutOfRange { pos, len } => {
                    write!(f, "OutOfRange: pos {pos} past length {len}")
                }
                ReadCause::ScopedCursorOutOfRange { target, len } => {
                    write!(f, "ScopedCursorOutOfRange: target {target}, length {len}")
                }
                ReadCause::Utf8 => write!(f, "Utf8"),
            }
        }
    }

    #[derive(Debug)]
    pub struct ReadError {
        cause: ReadCause,
        msg: String,
    }

    impl ReadError {
        pub fn new(cause: ReadCause, msg: &str) -> ReadError {
            ReadError {
                cause,
                msg: msg.into(),
            }
        }
    }

    impl Error for ReadError {}

    impl Display for ReadError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Read Error: {}, {}", self.cause, self.msg)
        }
    }
}

pub mod translate {
    use std::error::Error;
    use std::fmt::Display;

    use super::read::ReadError;

    /// Causes a class-level translation can fail for.
    #[derive(Debug)]
    pub enum TranslateCause {
        Read(ReadError),
        MissingTransform(u16),
        MalformedConstant(u16),
        UnsupportedForm(&'static str),
        TruncatedBytecode(usize),
    }

    impl Display for TranslateCause {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TranslateCause::Read(e) => write!(f, "Read: {e}"),
                TranslateCause::MissingTransform(index) => {
                    write!(f, "MissingTransform: source index {index}")
                }
                TranslateCause::MalformedConstant(index) => {
                    write!(f, "MalformedConstant: source index {index}")
                }
                TranslateCause::UnsupportedForm(what) => write!(f, "UnsupportedForm: {what}"),
                TranslateCause::TruncatedBytecode(at) => {
                    write!(f, "TruncatedBytecode: at offset {at}")
                }
            }
        }
    }

    #[derive(Debug)]
    pub struct TranslateError {
        cause: TranslateCause,
        msg: String,
    }

    impl TranslateError {
        pub fn new(cause: TranslateCause, msg: &str) -> TranslateError {
            TranslateError {
                cause,
                msg: msg.into(),
            }
        }

        pub fn unsupported(what: &'static str) -> TranslateError {
            TranslateError::new(TranslateCause::UnsupportedForm(what), "")
        }

        pub fn missing_transform(index: u16) -> TranslateError {
            TranslateError::new(TranslateCause::MissingTransform(index), "")
        }

        pub fn truncated(at: usize) -> TranslateError {
            TranslateError::new(TranslateCause::TruncatedBytecode(at), "")
        }
    }

    impl Error for TranslateError {}

    impl Display for TranslateError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "Translate Error: {}, {}", self.cause, self.msg)
        }
    }

    impl From<ReadError> for TranslateError {
        fn from(value: ReadError) -> Self {
            TranslateError::new(TranslateCause::Read(value), "")
        }
    }
}
