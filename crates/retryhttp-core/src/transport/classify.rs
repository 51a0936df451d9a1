//! Map libcurl errors onto [`TransportErrorKind`].

use super::TransportErrorKind;

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> TransportErrorKind {
    if e.is_operation_timedout() {
        return TransportErrorKind::Timeout;
    }
    if e.is_aborted_by_callback() {
        return TransportErrorKind::Aborted;
    }
    if e.is_couldnt_connect() || e.is_couldnt_resolve_host() || e.is_couldnt_resolve_proxy() {
        return TransportErrorKind::Connect;
    }
    if e.is_ssl_connect_error()
        || e.is_peer_failed_verification()
        || e.is_ssl_certproblem()
        || e.is_ssl_cipher()
        || e.is_ssl_cacert()
    {
        return TransportErrorKind::Tls;
    }
    if e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return TransportErrorKind::Io;
    }
    TransportErrorKind::Other
}

impl From<curl::Error> for super::TransportError {
    fn from(e: curl::Error) -> Self {
        super::TransportError::new(classify_curl_error(&e), e)
    }
}
