//! Logical host resolution
//!
//! Produces the host name used for TLS server-name verification and logging.

use crate::types::TlsConfig;

/// Host name used when talking to a server over a unix socket
pub const UNIX_SOCKET_HOST: &str = "libstorage-server";

/// Resolve the logical host for a connection.
///
/// A configured TLS server name wins, then unix sockets map to
/// [`UNIX_SOCKET_HOST`], otherwise the local address is used as is.
pub fn get_host(proto: &str, laddr: &str, tls: Option<&TlsConfig>) -> String {
    if let Some(server_name) = tls
        .and_then(|t| t.server_name.as_deref())
        .filter(|name| !name.is_empty())
    {
        tracing::debug!(get_host = server_name, "host from tls server name");
        return server_name.to_string();
    }

    if proto == "unix" {
        tracing::debug!(get_host = UNIX_SOCKET_HOST, "host for unix socket");
        return UNIX_SOCKET_HOST.to_string();
    }

    tracing::debug!(get_host = laddr, "host from local address");
    laddr.to_string()
}
