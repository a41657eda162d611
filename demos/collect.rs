//! Authorizes against Volvo ID (once) and collects vehicle data.
//!
//! Reads `CLIENT_ID`, `CLIENT_SECRET`, `REDIRECT_URI`, and `VCC_API_KEY` (optionally with a
//! `VOLVO_` prefix) from the environment.
//!
//! 1. When no usable token is stored, prints the authorization URL and waits for the redirect URL
//!    to be pasted on stdin.
//! 2. Without arguments, runs a single collection and prints each record.
//! 3. With `--every <seconds>`, runs the scheduler until Ctrl-C.

// std
use std::{env, io, time::Duration};
// crates.io
use color_eyre::{Result, eyre::eyre};
use tracing_subscriber::EnvFilter;
// self
use volvo_connect::{client::VolvoClient, config::VolvoConfig, request::Endpoint};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
		)
		.init();

	let client = VolvoClient::new(VolvoConfig::from_env()?)?;

	if !client.authorizer().is_authenticated().await {
		let (url, challenge) = client.authorizer().start_authorization()?;

		println!("Open this URL and paste the redirect URL below:\n{url}");

		let mut callback = String::new();

		io::stdin().read_line(&mut callback)?;
		client.authorizer().complete_authorization(&challenge, &callback).await?;

		println!("Authorization stored.");
	}

	let scheduler =
		client.scheduler([Endpoint::Fuel, Endpoint::Odometer, Endpoint::Doors, Endpoint::Location]);

	scheduler.register_data_callback("stdout", |vin, record| {
		println!("{vin}: {}", serde_json::to_string_pretty(&record.to_json()?)?);

		Ok(())
	});

	let mut args = env::args().skip(1);

	match (args.next().as_deref(), args.next()) {
		(None, _) => {
			let records = scheduler.collect_once().await;

			println!("Collected {} record(s).", records.len());
		},
		(Some("--every"), Some(seconds)) => {
			scheduler.start(Duration::from_secs(seconds.parse()?))?;
			tokio::signal::ctrl_c().await?;
			scheduler.stop().await;

			println!("{:?}", scheduler.stats());
		},
		_ => return Err(eyre!("usage: collect [--every <seconds>]")),
	}

	Ok(())
}
