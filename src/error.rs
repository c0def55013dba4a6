use std::fmt;

#[derive(Debug)]
#[allow(dead_code)]
pub enum GatewayError {
    NoNodeForHeight(u64),
    InvalidHeight(String),
    UnsupportedMethod(String),
    ParseError(String),
    UpstreamConnect(String),
    UpstreamTimeout,
    Config(String),
    Internal(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NoNodeForHeight(h) => write!(f, "no node found for height {}", h),
            GatewayError::InvalidHeight(msg) => write!(f, "invalid height parameter: {}", msg),
            GatewayError::UnsupportedMethod(m) => write!(f, "unsupported method: {}", m),
            GatewayError::ParseError(msg) => write!(f, "parse error: {}", msg),
            GatewayError::UpstreamConnect(msg) => write!(f, "upstream connect error: {}", msg),
            GatewayError::UpstreamTimeout => write!(f, "upstream timeout"),
            GatewayError::Config(msg) => write!(f, "config error: {}", msg),
            GatewayError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for GatewayError {}
