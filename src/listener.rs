//! UDP 리스너
//!
//! 소켓/OS 관심사를 재조립기에서 격리하는 액터:
//! - 수신 태스크: 데이터그램 수신 + 디코딩만 수행 (블록 작업 없음)
//! - 재조립 태스크: [`WindowReassembler`]를 단독 소유, 명령 채널로만 접근
//! - 완료 윈도우는 유한 큐로 방출, 가득 차면 drop-newest
//!
//! 데이터그램 하나가 불량이어도 수신 루프는 절대 죽지 않음

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use parking_lot::RwLock;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::packet::Fragment;
use crate::reassembler::{CompletedWindow, WindowReassembler};
use crate::sink::WindowReceiver;
use crate::stats::StatsSnapshot;
use crate::MAX_DATAGRAM_SIZE;

/// 내부 명령
enum ListenerCmd {
    Fragment(Fragment),
    Malformed,
    Stop,
}

/// 리스너 핸들 (외부에서 제어용)
pub struct Listener {
    cmd_tx: mpsc::Sender<ListenerCmd>,
    stats: Arc<RwLock<StatsSnapshot>>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
}

impl Listener {
    /// 소켓 바인딩 후 리스너 시작
    ///
    /// 바인딩 실패만 치명적 에러. 반환된 [`WindowReceiver`]로
    /// 완료 윈도우를 소비함 ([`crate::sink::run_sink`] 참고)
    pub async fn start(config: Config, bind_addr: SocketAddr) -> Result<(Self, WindowReceiver)> {
        config.validate()?;

        // 커널 수신 버퍼를 설정한 뒤 바인딩. 버스트 구간에서 수신 루프가
        // 따라가지 못할 때 커널 수준 드랍을 줄이는 유일한 손잡이임
        let raw = Socket::new(Domain::for_address(bind_addr), Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_recv_buffer_size(config.recv_buffer_size)?;
        raw.set_nonblocking(true)?;
        raw.bind(&bind_addr.into())?;
        let socket = UdpSocket::from_std(raw.into())?;
        let local_addr = socket.local_addr()?;

        let (cmd_tx, mut cmd_rx) = mpsc::channel::<ListenerCmd>(config.cmd_queue_depth);
        let (completed_tx, completed_rx) =
            mpsc::channel::<CompletedWindow>(config.sink_queue_depth);

        let stats = Arc::new(RwLock::new(StatsSnapshot::default()));
        let running = Arc::new(AtomicBool::new(true));

        info!(
            "SWP Listener started on {} (window={} samples, {} fragments expected)",
            local_addr, config.window_capacity, config.expected_fragments_per_window
        );

        // ─────────────────────────────────────────────────────────────
        // 수신 태스크: 데이터그램 → 디코딩 → 명령 채널
        // ─────────────────────────────────────────────────────────────
        let cmd_tx_recv = cmd_tx.clone();
        let running_recv = running.clone();

        tokio::spawn(async move {
            let mut buf = BytesMut::zeroed(MAX_DATAGRAM_SIZE);

            while running_recv.load(Ordering::SeqCst) {
                match tokio::time::timeout(
                    Duration::from_millis(10),
                    socket.recv_from(&mut buf[..]),
                )
                .await
                {
                    Ok(Ok((len, addr))) => {
                        let cmd = match Fragment::decode(&buf[..len]) {
                            Ok(fragment) => ListenerCmd::Fragment(fragment),
                            Err(e) => {
                                debug!("디코딩 실패 ({} bytes from {}): {}", len, addr, e);
                                ListenerCmd::Malformed
                            }
                        };
                        if cmd_tx_recv.send(cmd).await.is_err() {
                            break;
                        }
                    }
                    Ok(Err(e)) => {
                        warn!("수신 에러: {}", e);
                    }
                    Err(_) => {
                        // 타임아웃, running 플래그 재확인
                    }
                }
            }
            // 태스크 종료와 함께 소켓 해제
        });

        // ─────────────────────────────────────────────────────────────
        // 재조립 태스크: WindowReassembler 단독 소유
        // ─────────────────────────────────────────────────────────────
        let mut reassembler = WindowReassembler::new(config);
        let stats_main = stats.clone();
        let running_main = running.clone();

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    ListenerCmd::Fragment(fragment) => {
                        if let Some(completed) = reassembler.ingest(fragment) {
                            // 싱크 큐가 가득이면 최신 윈도우를 버림.
                            // 수신 경로를 기다리게 하면 커널 수준 패킷 손실로
                            // 이어지므로 어떤 경우에도 블록하지 않음
                            match completed_tx.try_send(completed) {
                                Ok(()) => {}
                                Err(TrySendError::Full(window)) => {
                                    reassembler.record_sink_drop();
                                    warn!(
                                        "방출 큐 포화: 윈도우 {} 폐기",
                                        window.window_id
                                    );
                                }
                                Err(TrySendError::Closed(window)) => {
                                    reassembler.record_sink_drop();
                                    debug!(
                                        "싱크 채널 닫힘: 윈도우 {} 폐기",
                                        window.window_id
                                    );
                                }
                            }
                        }
                    }
                    ListenerCmd::Malformed => {
                        reassembler.record_malformed();
                    }
                    ListenerCmd::Stop => {
                        break;
                    }
                }

                *stats_main.write() = reassembler.snapshot();
            }

            running_main.store(false, Ordering::SeqCst);
            info!("SWP Listener stopped: {}", reassembler.snapshot().summary());
        });

        let listener = Self {
            cmd_tx,
            stats,
            running,
            local_addr,
        };

        Ok((listener, completed_rx))
    }

    /// 정지 (멱등, 진행 중인 수신과 동시 호출해도 안전)
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.cmd_tx.send(ListenerCmd::Stop).await;
    }

    /// 헬스/통계 스냅샷
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.read().clone()
    }

    /// 바인딩된 로컬 주소 (port 0 바인딩 시 실제 포트 확인용)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// 실행 중 여부
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
