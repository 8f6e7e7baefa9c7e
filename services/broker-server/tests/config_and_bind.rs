use broker_core::Server;
use broker_server::config::{load_options_from_path, load_options_from_str};
use std::io::Write;

#[tokio::test]
async fn loaded_options_bind_successfully() {
    let options = load_options_from_str("port = 0\n").unwrap();
    let server = Server::bind("127.0.0.1:0".parse().unwrap(), options).await.unwrap();
    assert!(server.local_addr().unwrap().port() > 0);
}

#[test]
fn loads_config_from_a_real_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 4300\nmax_connections = 10").unwrap();

    let options = load_options_from_path(file.path()).unwrap();
    assert_eq!(options.port, 4300);
    assert_eq!(options.max_conn, 10);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let err = load_options_from_path(std::path::Path::new("/nonexistent/broker.toml")).unwrap_err();
    assert!(matches!(err, broker_server::config::ConfigError::Io(_)));
}
