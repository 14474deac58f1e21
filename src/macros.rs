macro_rules! invalid_container {
    ($s:expr) => {
        $crate::types::Error::InvalidContainer($s.into())
    };
    ($fmt:expr, $($args:tt)*) => {
        $crate::types::Error::InvalidContainer(format!($fmt, $($args)*).into())
    }
}

macro_rules! unsupported_variant {
    ($s:expr) => {
        $crate::types::Error::UnsupportedVariant($s.into())
    };
    ($fmt:expr, $($args:tt)*) => {
        $crate::types::Error::UnsupportedVariant(format!($fmt, $($args)*).into())
    }
}

macro_rules! unexpected_eof {
    () => {
        $crate::types::Error::UnexpectedEndOfFile(None)
    };
    ($s:expr) => {
        $crate::types::Error::UnexpectedEndOfFile(Some($s.into()))
    };
    ($fmt:expr, $($args:tt)*) => {
        $crate::types::Error::UnexpectedEndOfFile(Some(format!($fmt, $($args)*).into()))
    }
}

macro_rules! if_eof {
    ($s:expr) => {
        |e: ::std::io::Error| match e.kind() {
            ::std::io::ErrorKind::UnexpectedEof => unexpected_eof!($s),
            _ => $crate::types::Error::Io(e)
        }
    };
    ($fmt:expr, $($args:tt)*) => {
        |e: ::std::io::Error| match e.kind() {
            ::std::io::ErrorKind::UnexpectedEof => unexpected_eof!($fmt, $($args)*),
            _ => $crate::types::Error::Io(e)
        }
    }
}

macro_rules! try_if_eof {
    ($e:expr, $s:expr) => {
        $e.map_err(if_eof!($s))?
    };
    ($e:expr, $fmt:expr, $($args:tt)*) => {
        $e.map_err(if_eof!($fmt, $($args)*))?
    }
}
