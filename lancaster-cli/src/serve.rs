use std::sync::Mutex;

use lancaster::{Server, ServerConfig};
use lancaster_tarball::TarballReader;
use lancaster_transport::UdpTransport;

use crate::cli::{Cli, ServeCmd};
use crate::specs::expand_specs;

pub async fn run(cli: &Cli, cmd: &ServeCmd) -> Result<(), Box<dyn std::error::Error>> {
    let specs = expand_specs(&cmd.specs)?;
    let reader = TarballReader::open(specs)?;
    log::info!("serving tarball {}", reader.hash_id());
    println!("hash_id: {}", reader.hash_id());

    let mcast = cli.mcast_config()?;
    let transport = UdpTransport::bind(&mcast).await?;
    let mut server = Server::new(ServerConfig::default(), transport, reader)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown_tx = Mutex::new(Some(shutdown_tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })?;

    server.run(shutdown_rx).await?;
    Ok(())
}
