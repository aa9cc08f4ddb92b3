//! SWP 가상 센서 디바이스
//!
//! 실제 센서 없이 수집기를 시험하기 위한 송신기. 전압 파형 윈도우를
//! 생성해 프래그먼트로 쪼개 UDP로 쏜다. 손실/중복/순서 뒤섞기를
//! 주입해 재조립기의 내성을 확인할 수 있음
//!
//! 사용법:
//!   cargo run --release --bin swp-device -- [OPTIONS]
//!
//! 예시:
//!   # 기본 송신 (윈도우 10개)
//!   cargo run --release --bin swp-device -- --target 127.0.0.1:3000
//!
//!   # 5% 손실 + 10% 중복 + 순서 뒤섞기
//!   cargo run --release --bin swp-device -- -t 127.0.0.1:3000 --loss 0.05 --duplicate 0.1 --shuffle

use std::net::SocketAddr;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::net::UdpSocket;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use swp::{Config, Fragment};

/// 디바이스 설정
struct DeviceConfig {
    target_addr: SocketAddr,
    window_count: u32,
    loss_ratio: f64,
    duplicate_ratio: f64,
    shuffle: bool,
    voltage_range: (f32, f32),
    config: Config,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            target_addr: "127.0.0.1:3000".parse().unwrap(),
            window_count: 10,
            loss_ratio: 0.0,
            duplicate_ratio: 0.0,
            shuffle: false,
            voltage_range: (1.5, 2.0),
            config: Config::default(),
        }
    }
}

fn parse_args(args: &[String]) -> DeviceConfig {
    let mut device = DeviceConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--target" | "-t" => {
                if i + 1 < args.len() {
                    device.target_addr = args[i + 1].parse().expect("유효한 주소 필요");
                    i += 1;
                }
            }
            "--windows" | "-n" => {
                if i + 1 < args.len() {
                    device.window_count = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--loss" => {
                if i + 1 < args.len() {
                    device.loss_ratio = args[i + 1].parse().expect("유효한 비율 필요");
                    i += 1;
                }
            }
            "--duplicate" => {
                if i + 1 < args.len() {
                    device.duplicate_ratio = args[i + 1].parse().expect("유효한 비율 필요");
                    i += 1;
                }
            }
            "--shuffle" => {
                device.shuffle = true;
            }
            "--window-capacity" => {
                if i + 1 < args.len() {
                    device.config.window_capacity = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--fragment-samples" => {
                if i + 1 < args.len() {
                    device.config.samples_per_fragment =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!(
                    r#"SWP Device - 가상 센서 디바이스 (테스트 송신기)

전압 파형 윈도우를 프래그먼트로 쪼개 UDP로 송신
- 윈도우 간격에 맞춰 페이싱 (기본: 1초에 120 프래그먼트)
- 손실/중복/순서 뒤섞기 주입 가능

사용법:
  cargo run --release --bin swp-device -- [OPTIONS]

옵션:
  -t, --target <ADDR>         수집기 주소 (기본: 127.0.0.1:3000)
  -n, --windows <N>           송신할 윈도우 수 (기본: 10)
  --loss <RATIO>              프래그먼트 손실 비율 0.0~1.0 (기본: 0)
  --duplicate <RATIO>         프래그먼트 중복 비율 0.0~1.0 (기본: 0)
  --shuffle                   윈도우 내 프래그먼트 순서 뒤섞기
  --window-capacity <N>       윈도우 샘플 수 (기본: 38400)
  --fragment-samples <N>      프래그먼트당 샘플 수 (기본: 320)
  -h, --help                  이 도움말 출력
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    // 파생값은 플래그 순서와 무관하게 파싱 종료 후 한 번만 계산
    if device.config.samples_per_fragment > 0 {
        device.config.expected_fragments_per_window =
            device.config.window_capacity / device.config.samples_per_fragment;
    }

    device
}

/// 윈도우 하나 분량의 전압 파형 생성 (사인파 + 잡음)
fn generate_window(rng: &mut StdRng, config: &Config, range: (f32, f32)) -> Vec<f32> {
    let (lo, hi) = range;
    let mid = (lo + hi) / 2.0;
    let amplitude = (hi - lo) / 2.0;
    let rate = config.sample_rate.max(1) as f32;

    (0..config.window_capacity)
        .map(|i| {
            let t = i as f32 / rate;
            let wave = (2.0 * std::f32::consts::PI * 50.0 * t).sin();
            let noise: f32 = rng.gen_range(-0.1..0.1);
            mid + amplitude * 0.8 * wave + amplitude * noise
        })
        .collect()
}

/// 윈도우를 프래그먼트들로 분할
fn split_window(
    window_id: u32,
    samples: &[f32],
    samples_per_fragment: usize,
    next_sequence_id: &mut u32,
) -> Vec<Fragment> {
    samples
        .chunks(samples_per_fragment)
        .enumerate()
        .map(|(idx, payload)| {
            let sequence_id = *next_sequence_id;
            *next_sequence_id += 1;
            Fragment::new(
                window_id,
                sequence_id,
                (idx * samples_per_fragment) as u32,
                payload.to_vec(),
            )
        })
        .collect()
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
    let device = parse_args(&args);
    device.config.validate()?;

    info!("SWP Device starting...");
    info!("Target: {}", device.target_addr);
    info!(
        "Windows: {} × {} samples ({} fragments each)",
        device.window_count,
        device.config.window_capacity,
        device.config.expected_fragments_per_window
    );
    if device.loss_ratio > 0.0 || device.duplicate_ratio > 0.0 || device.shuffle {
        info!(
            "Fault injection: loss {:.0}%, duplicate {:.0}%, shuffle {}",
            device.loss_ratio * 100.0,
            device.duplicate_ratio * 100.0,
            device.shuffle
        );
    }

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(device.target_addr).await?;

    let mut rng = StdRng::from_entropy();
    let mut next_sequence_id = 0u32;

    // 프래그먼트 간격: 윈도우 시간 / 프래그먼트 수 (기본 1초/120 ≈ 8.3ms)
    let fragment_interval = device
        .config
        .window_duration()
        .div_f64(device.config.expected_fragments_per_window.max(1) as f64);

    let start = Instant::now();
    let mut sent_fragments = 0u64;
    let mut dropped_fragments = 0u64;

    for window_id in 0..device.window_count {
        let samples = generate_window(&mut rng, &device.config, device.voltage_range);
        let mut fragments = split_window(
            window_id,
            &samples,
            device.config.samples_per_fragment,
            &mut next_sequence_id,
        );

        if device.shuffle {
            fragments.shuffle(&mut rng);
        }

        for fragment in &fragments {
            if device.loss_ratio > 0.0 && rng.gen::<f64>() < device.loss_ratio {
                dropped_fragments += 1;
            } else {
                socket.send(&fragment.encode()).await?;
                sent_fragments += 1;

                if device.duplicate_ratio > 0.0 && rng.gen::<f64>() < device.duplicate_ratio {
                    socket.send(&fragment.encode()).await?;
                    sent_fragments += 1;
                }
            }

            tokio::time::sleep(fragment_interval).await;
        }

        info!(
            "윈도우 {} 송신 완료 ({}/{})",
            window_id,
            window_id + 1,
            device.window_count
        );
    }

    let elapsed = start.elapsed();
    info!("송신 종료!");
    info!("  Time: {:.2}s", elapsed.as_secs_f64());
    info!("  Fragments sent: {}", sent_fragments);
    if dropped_fragments > 0 {
        info!("  Fragments dropped (injected loss): {}", dropped_fragments);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("swp-device")
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
    fn test_split_window_covers_capacity() {
        let mut next_sequence_id = 7u32;
        let samples = vec![1.0f32; 1024];
        let fragments = split_window(3, &samples, 128, &mut next_sequence_id);

        assert_eq!(fragments.len(), 8);
        assert_eq!(next_sequence_id, 15);
        assert_eq!(fragments[0].offset, 0);
        assert_eq!(fragments[7].offset, 896);
        assert!(fragments.iter().all(|f| f.window_id == 3));
    }
}
