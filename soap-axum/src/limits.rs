//! Message size limits for SOAP requests and responses.
//!
//! - **Receive limit**: incoming request bodies, checked before any XML is
//!   parsed and again after extensions have decoded (decompressed) them.
//!   Oversized requests answer a Client fault.
//! - **Send limit**: outgoing response bodies, checked after extensions have
//!   encoded them. Oversized responses answer a Server fault instead.

/// Default maximum request size (4 MiB).
pub const DEFAULT_RECEIVE_MAX_BYTES: usize = 4 * 1024 * 1024;

/// Configuration for message size limits.
///
/// # Example
///
/// ```rust
/// use soap_axum::MessageLimits;
///
/// // 4 MiB requests, unlimited responses
/// let limits = MessageLimits::default();
///
/// let limits = MessageLimits::new()
///     .receive_max_bytes(16 * 1024 * 1024)
///     .send_max_bytes(8 * 1024 * 1024);
///
/// // No limit (not recommended for production)
/// let limits = MessageLimits::unlimited();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLimits {
    receive_max_bytes: Option<usize>,
    send_max_bytes: Option<usize>,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            receive_max_bytes: Some(DEFAULT_RECEIVE_MAX_BYTES),
            send_max_bytes: None,
        }
    }
}

impl MessageLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// No limits in either direction.
    ///
    /// # Security Warning
    ///
    /// Unlimited request sizes let a peer exhaust server memory. Only use this
    /// in trusted environments.
    pub fn unlimited() -> Self {
        Self {
            receive_max_bytes: None,
            send_max_bytes: None,
        }
    }

    pub fn receive_max_bytes(mut self, max: usize) -> Self {
        self.receive_max_bytes = Some(max);
        self
    }

    pub fn send_max_bytes(mut self, max: usize) -> Self {
        self.send_max_bytes = Some(max);
        self
    }

    pub fn get_receive_max_bytes(&self) -> Option<usize> {
        self.receive_max_bytes
    }

    pub fn get_send_max_bytes(&self) -> Option<usize> {
        self.send_max_bytes
    }

    /// Limit for use with `axum::body::to_bytes`; `usize::MAX` if unlimited.
    pub fn receive_max_bytes_or_max(&self) -> usize {
        self.receive_max_bytes.unwrap_or(usize::MAX)
    }

    pub fn check_size(&self, size: usize) -> Result<(), String> {
        if let Some(max) = self.receive_max_bytes
            && size > max
        {
            return Err(format!(
                "message size {} bytes exceeds maximum allowed size of {} bytes",
                size, max
            ));
        }
        Ok(())
    }

    pub fn check_send_size(&self, size: usize) -> Result<(), String> {
        if let Some(max) = self.send_max_bytes
            && size > max
        {
            return Err(format!("message size {} exceeds sendMaxBytes {}", size, max));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = MessageLimits::default();
        assert_eq!(limits.get_receive_max_bytes(), Some(DEFAULT_RECEIVE_MAX_BYTES));
        assert_eq!(limits.get_send_max_bytes(), None);
    }

    #[test]
    fn test_builder_methods() {
        let limits = MessageLimits::new().receive_max_bytes(1024).send_max_bytes(2048);
        assert_eq!(limits.get_receive_max_bytes(), Some(1024));
        assert_eq!(limits.get_send_max_bytes(), Some(2048));
    }

    #[test]
    fn test_check_size() {
        let limits = MessageLimits::new().receive_max_bytes(1024);
        assert!(limits.check_size(1024).is_ok());
        let err_msg = limits.check_size(1025).unwrap_err();
        assert!(err_msg.contains("1025"));
        assert!(err_msg.contains("1024"));
    }

    #[test]
    fn test_check_send_size() {
        let limits = MessageLimits::new().send_max_bytes(10);
        assert!(limits.check_send_size(10).is_ok());
        assert!(limits.check_send_size(11).is_err());
    }

    #[test]
    fn test_unlimited() {
        let limits = MessageLimits::unlimited();
        assert!(limits.check_size(usize::MAX).is_ok());
        assert!(limits.check_send_size(usize::MAX).is_ok());
        assert_eq!(limits.receive_max_bytes_or_max(), usize::MAX);
    }
}
