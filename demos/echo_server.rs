use std::error::Error;
use std::net::SocketAddr;

use raknet_transport::{RaknetConnection, RaknetListener, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:19132".to_string())
        .parse()?;

    let config = ServerConfig::default().with_advertisement(
        "MCPE;Echo Server;527;1.19.1;0;10;13253860892328930865;Bedrock level;Survival;1;19132",
    );
    let mut listener = RaknetListener::bind(bind_addr, config).await?;
    println!("Echo server listening on {}", listener.local_addr());

    while let Some(conn) = listener.accept().await {
        tokio::spawn(echo(conn));
    }
    Ok(())
}

async fn echo(mut conn: RaknetConnection) {
    let peer = conn.peer_addr();
    println!("[{}] connected", peer);

    while let Some(res) = conn.recv().await {
        match res {
            Ok(payload) => {
                if let Err(e) = conn.send(payload).await {
                    println!("[{}] send failed: {}", peer, e);
                    break;
                }
            }
            Err(e) => {
                println!("[{}] {}", peer, e);
                break;
            }
        }
    }
    println!("[{}] gone", peer);
}
