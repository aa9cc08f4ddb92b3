//! SWP 수집기 - Sensor Window Protocol
//!
//! 센서 디바이스의 UDP 프래그먼트를 윈도우로 재조립해 싱크로 넘기는 데몬
//! - 순서/중복/손실 내성, 메모리 상한, 수신 루프 무블록
//!
//! 사용법:
//!   cargo run --release --bin swp-collector -- [OPTIONS]
//!
//! 예시:
//!   # 기본 수신 (38400 샘플 윈도우, 320샘플 × 120 프래그먼트)
//!   cargo run --release --bin swp-collector -- --bind 0.0.0.0:3000
//!
//!   # 손실 많은 네트워크 프리셋
//!   cargo run --release --bin swp-collector -- -b 0.0.0.0:3000 --lossy

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swp::sink::run_sink;
use swp::{Config, Listener, LogSink};

/// 수집기 설정
struct CollectorConfig {
    bind_addr: SocketAddr,
    config: Config,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".parse().unwrap(),
            config: Config::default(),
        }
    }
}

fn parse_args(args: &[String]) -> CollectorConfig {
    let mut collector = CollectorConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    collector.bind_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--window-capacity" => {
                if i + 1 < args.len() {
                    collector.config.window_capacity =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--fragment-samples" => {
                if i + 1 < args.len() {
                    collector.config.samples_per_fragment =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--max-windows" => {
                if i + 1 < args.len() {
                    collector.config.max_open_windows =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--queue-depth" => {
                if i + 1 < args.len() {
                    collector.config.sink_queue_depth =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--lossy" => {
                collector.config = Config::lossy_network();
            }
            "--help" | "-h" => {
                println!(
                    r#"SWP Collector - Sensor Window Protocol 수집기

센서 디바이스가 쏘는 UDP 프래그먼트를 1초 윈도우로 재조립하는 데몬
- 순서 뒤바뀜/중복/손실 허용, 완료 윈도우만 싱크로 전달
- 미완료 윈도우는 메모리 상한에서 가장 오래된 것부터 축출

사용법:
  cargo run --release --bin swp-collector -- [OPTIONS]

옵션:
  -b, --bind <ADDR>           바인드 주소 (기본: 0.0.0.0:3000)
  --window-capacity <N>       윈도우 샘플 수 (기본: 38400)
  --fragment-samples <N>      프래그먼트당 샘플 수 (기본: 320)
  --max-windows <N>           최대 동시 윈도우 수 (기본: 3)
  --queue-depth <N>           완료 윈도우 큐 깊이 (기본: 8)
  --lossy                     손실 많은 네트워크 프리셋 사용
  -h, --help                  이 도움말 출력

예시:
  # 기본 수신
  cargo run --release --bin swp-collector -- --bind 0.0.0.0:3000

  # 소형 윈도우로 빠른 확인
  cargo run --release --bin swp-collector -- --window-capacity 1024 --fragment-samples 128
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    // 파생값은 플래그 순서와 무관하게 파싱 종료 후 한 번만 계산
    if collector.config.samples_per_fragment > 0 {
        collector.config.expected_fragments_per_window =
            collector.config.window_capacity / collector.config.samples_per_fragment;
    }

    collector
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 설정
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args: Vec<String> = std::env::args().collect();
    let collector = parse_args(&args);

    info!("SWP Collector starting...");
    info!("Bind address: {}", collector.bind_addr);
    info!("Window capacity: {} samples", collector.config.window_capacity);
    info!(
        "Fragments: {} samples × {} per window",
        collector.config.samples_per_fragment,
        collector.config.expected_fragments_per_window
    );
    info!("Max open windows: {}", collector.config.max_open_windows);
    info!(
        "Expected datagram size: {} bytes",
        collector.config.fragment_datagram_size()
    );

    // 소켓 바인딩 실패만 치명적
    let (listener, window_rx) = Listener::start(collector.config, collector.bind_addr).await?;
    let listener = Arc::new(listener);

    // 싱크 펌프: 완료 윈도우를 로그 싱크로 소비
    let sink_task = tokio::spawn(run_sink(window_rx, LogSink::new()));

    // 통계 요약 주기 출력
    let stats_listener = listener.clone();
    let stats_task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            info!("{}", stats_listener.stats().summary());
        }
    });

    // Ctrl-C 대기 후 정리
    tokio::signal::ctrl_c().await?;
    info!("종료 신호 수신, 리스너 정지 중...");

    listener.stop().await;
    stats_task.abort();

    let failures = sink_task.await.unwrap_or(0);
    info!("Final stats: {}", listener.stats().summary());
    if failures > 0 {
        info!("Sink publish failures: {}", failures);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("swp-collector")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_fragment_count_ignores_flag_order() {
        let first = parse_args(&args(&["--fragment-samples", "128", "--window-capacity", "1024"]));
        let second = parse_args(&args(&["--window-capacity", "1024", "--fragment-samples", "128"]));

        assert_eq!(first.config.expected_fragments_per_window, 8);
        assert_eq!(second.config.expected_fragments_per_window, 8);
        assert!(first.config.validate().is_ok());
    }

    #[test]
    fn test_default_args_keep_default_config() {
        let collector = parse_args(&args(&[]));
        assert_eq!(collector.config.expected_fragments_per_window, 120);
        assert_eq!(collector.bind_addr, "0.0.0.0:3000".parse().unwrap());
    }
}
