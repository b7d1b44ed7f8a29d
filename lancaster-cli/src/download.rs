use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};
use lancaster::{Client, ClientConfig};
use lancaster_transport::UdpTransport;

use crate::cli::{Cli, DownloadCmd};

pub async fn run(cli: &Cli, cmd: &DownloadCmd) -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = cmd.out.clone().unwrap_or_else(|| ".".into());
    std::fs::create_dir_all(&out_dir)?;

    let mcast = cli.mcast_config()?;
    let transport = UdpTransport::bind(&mcast).await?;

    let config = ClientConfig {
        expected_hash_id: cmd.hash_id,
        ..Default::default()
    };
    let mut client = Client::new(config, transport, out_dir);

    let bar = Arc::new(Mutex::new(None::<ProgressBar>));
    let bar_for_callback = bar.clone();
    client.set_progress_callback(move |received, total| {
        let mut guard = bar_for_callback.lock().unwrap();
        let progress_bar = guard.get_or_insert_with(|| make_progress_bar(total));
        progress_bar.set_position(received);
    });

    client.run().await?;

    if let Some(progress_bar) = bar.lock().unwrap().as_ref() {
        progress_bar.finish_with_message("download complete");
    }
    log::info!("download complete: {:?}", client.hash_id());
    Ok(())
}

fn make_progress_bar(total: u64) -> ProgressBar {
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    progress
}
