use deadpool_postgres::{Config, CreatePoolError, Pool, Runtime};
use tokio_postgres_rustls::MakeRustlsConnect;

/// postgres pool over rustls with the webpki root store
pub fn create_pool(database_url: &str) -> Result<Pool, CreatePoolError> {
    let mut config = Config::new();
    config.url = Some(database_url.to_string());
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = MakeRustlsConnect::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    config.create_pool(Some(Runtime::Tokio1), tls)
}
