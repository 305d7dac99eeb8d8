//! GBN-FTP 클라이언트 (송신자)
//!
//! TCP로 파일 이름을 협상한 뒤 UDP Go-Back-N으로 파일을 전송
//!
//! 사용법:
//!   cargo run --release --bin gbnftp-client -- [OPTIONS] --port <PORT> --file <PATH>
//!
//! 예시:
//!   # 기본 전송 (윈도우 10, 타임아웃 100ms)
//!   cargo run --release --bin gbnftp-client -- -s 127.0.0.1 -p 9000 -f data.bin
//!
//!   # 손실이 많은 링크
//!   cargo run --release --bin gbnftp-client -- -p 9000 -f data.bin --profile lossy

use std::path::PathBuf;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use gbnftp::{Config, Sender};

/// 클라이언트 설정
struct ClientConfig {
    server_name: String,
    server_port: Option<u16>,
    file_path: Option<PathBuf>,
    config: Config,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost".to_string(),
            server_port: None,
            file_path: None,
            config: Config::default(),
        }
    }
}

fn print_help() {
    println!(
        r#"GBN-FTP Client - Go-Back-N 파일 송신기

TCP 제어 채널로 파일 이름을 협상하고 UDP로 파일을 전송
- 고정 윈도우 + 누적 ACK
- 타임아웃 시 윈도우 전체 재전송

사용법:
  cargo run --release --bin gbnftp-client -- [OPTIONS] --port <PORT> --file <PATH>

옵션:
  -s, --server <HOST>      서버 주소 (기본: localhost)
  -p, --port <PORT>        서버 포트 (필수)
  -f, --file <PATH>        전송할 파일 경로 (필수)
  -w, --window <N>         윈도우 크기, 세그먼트 단위 (기본: 10)
  -t, --timeout <MS>       재전송 타임아웃 밀리초 (기본: 100)
  --max-timeouts <N>       연속 타임아웃 N회 초과 시 중단 (기본: 무제한)
  --profile <NAME>         설정 프리셋: default | lan | lossy
  -h, --help               이 도움말 출력

로그 레벨은 RUST_LOG 환경 변수로 조정 (기본: info)
"#
    );
}

fn parse_args() -> ClientConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = ClientConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--server" | "-s" => {
                if i + 1 < args.len() {
                    config.server_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    config.server_port = Some(args[i + 1].parse().expect("유효한 포트 필요"));
                    i += 1;
                }
            }
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--window" | "-w" => {
                if i + 1 < args.len() {
                    config.config.window_size = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--timeout" | "-t" => {
                if i + 1 < args.len() {
                    config.config.retransmission_timeout_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-timeouts" => {
                if i + 1 < args.len() {
                    config.config.max_consecutive_timeouts =
                        Some(args[i + 1].parse().expect("유효한 숫자 필요"));
                    i += 1;
                }
            }
            "--profile" => {
                if i + 1 < args.len() {
                    config.config = match args[i + 1].as_str() {
                        "lan" => Config::lan(),
                        "lossy" => Config::lossy_network(),
                        _ => Config::default(),
                    };
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let client_config = parse_args();

    let (server_port, file_path) = match (client_config.server_port, client_config.file_path) {
        (Some(port), Some(path)) => (port, path),
        _ => {
            print_help();
            std::process::exit(2);
        }
    };

    info!("GBN-FTP Client starting...");
    info!(
        "Server: {}:{}, window={}, timeout={}ms",
        client_config.server_name,
        server_port,
        client_config.config.window_size,
        client_config.config.retransmission_timeout_ms
    );

    let sender = Sender::new(client_config.config);

    info!("sending file '{}' to server...", file_path.display());
    let stats = sender
        .send(&client_config.server_name, server_port, &file_path)
        .await?;

    info!("file transfer completed.");
    println!("{}", stats.summary());

    Ok(())
}
