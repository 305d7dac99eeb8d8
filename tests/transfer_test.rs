//! 송신자 전체 흐름 테스트
//!
//! 루프백에서 가짜 수신자를 띄워 핸드셰이크, 데이터 전송, 누적 ACK, 종료 알림을
//! 검증한다. 수신자는 TCP 리스너와 같은 포트에 UDP 소켓을 열고,
//! 순서대로 도착한 세그먼트마다 다음 기대 시퀀스 번호로 ACK를 보낸다.

use std::io::Write;
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::task::JoinHandle;

use gbnftp::{Config, Error, Phase, Segment, Sender, SeqNum};

/// 가짜 수신자가 관찰한 내용
#[derive(Debug, Default)]
struct ReceiverReport {
    file_name: String,
    data: Vec<u8>,
    /// 도착한 데이터 세그먼트 (시퀀스 번호, 페이로드 길이), 버린 것 제외
    arrivals: Vec<(SeqNum, usize)>,
    dropped: Vec<SeqNum>,
    acks_sent: usize,
    end_byte: Option<u8>,
    /// 종료 바이트 수신 시점에 송신자의 데이터 포트가 비어 있었는지
    data_port_released: bool,
}

type DropPolicy = Box<dyn FnMut(SeqNum) -> bool + Send>;

async fn spawn_receiver(reply: u8, mut should_drop: DropPolicy) -> (SocketAddr, JoinHandle<ReceiverReport>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let udp = UdpSocket::bind(addr).await.unwrap();

    let handle = tokio::spawn(async move {
        let mut report = ReceiverReport::default();

        let (mut stream, _) = listener.accept().await.unwrap();
        let len = stream.read_u16().await.unwrap() as usize;
        let mut name = vec![0u8; len];
        stream.read_exact(&mut name).await.unwrap();
        report.file_name = String::from_utf8(name).unwrap();

        stream.write_u8(reply).await.unwrap();
        if reply != 0 {
            return report;
        }

        let mut expected: SeqNum = 0;
        let mut data_addr = None;
        let mut buf = vec![0u8; 2048];
        loop {
            tokio::select! {
                end = stream.read_u8() => {
                    report.end_byte = end.ok();
                    if let Some(addr) = data_addr {
                        report.data_port_released = UdpSocket::bind(addr).await.is_ok();
                    }
                    break;
                }
                received = udp.recv_from(&mut buf) => {
                    let (len, from) = received.unwrap();
                    data_addr = Some(from);
                    let segment = Segment::decode(&buf[..len]).unwrap();
                    let seq_num = segment.seq_num();

                    if should_drop(seq_num) {
                        report.dropped.push(seq_num);
                        continue;
                    }

                    report.arrivals.push((seq_num, segment.payload().len()));
                    if seq_num == expected {
                        report.data.extend_from_slice(segment.payload());
                        expected += 1;
                    }

                    udp.send_to(&Segment::ack(expected).encode(), from).await.unwrap();
                    report.acks_sent += 1;
                }
            }
        }

        report
    });

    (addr, handle)
}

fn no_loss() -> DropPolicy {
    Box::new(|_| false)
}

/// 지정한 시퀀스 번호의 첫 전송만 버림
fn drop_first_transmission_of(target: SeqNum) -> DropPolicy {
    let mut dropped = false;
    Box::new(move |seq_num| {
        if seq_num == target && !dropped {
            dropped = true;
            true
        } else {
            false
        }
    })
}

fn temp_file(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}

fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

async fn send_with_deadline(
    sender: &Sender,
    addr: SocketAddr,
    file: &NamedTempFile,
) -> gbnftp::Result<gbnftp::TransferStats> {
    tokio::time::timeout(
        Duration::from_secs(20),
        sender.send("127.0.0.1", addr.port(), file.path()),
    )
    .await
    .expect("transfer did not finish in time")
}

#[tokio::test]
async fn test_transfer_without_loss() {
    let data = sample_data(3500);
    let file = temp_file(&data);
    let (addr, receiver) = spawn_receiver(0, no_loss()).await;

    let sender = Sender::with_window(4, 500);
    let stats = send_with_deadline(&sender, addr, &file).await.unwrap();
    let report = receiver.await.unwrap();

    assert_eq!(
        report.arrivals,
        vec![(0, 1000), (1, 1000), (2, 1000), (3, 500)]
    );
    assert_eq!(report.data, data);
    assert_eq!(report.acks_sent, 4);
    assert_eq!(report.end_byte, Some(0));
    assert_eq!(report.file_name, file.path().to_string_lossy());
    assert!(report.data_port_released);

    assert_eq!(stats.segments_sent, 4);
    assert_eq!(stats.bytes_sent, 3500);
    assert_eq!(stats.acks_received, 4);
    assert_eq!(stats.retransmitted_segments, 0);
    assert_eq!(stats.timeouts, 0);
    assert_eq!(sender.phase(), Phase::Closed);
}

#[tokio::test]
async fn test_single_loss_causes_one_window_retransmission() {
    let data = sample_data(3500);
    let file = temp_file(&data);
    let (addr, receiver) = spawn_receiver(0, drop_first_transmission_of(1)).await;

    let sender = Sender::with_window(4, 200);
    let stats = send_with_deadline(&sender, addr, &file).await.unwrap();
    let report = receiver.await.unwrap();

    assert_eq!(report.data, data);
    assert_eq!(report.dropped, vec![1]);
    assert_eq!(report.end_byte, Some(0));

    // 0 확인 후 남은 1..=3 전체가 한 번 재전송됨
    let seqs: Vec<SeqNum> = report.arrivals.iter().map(|&(seq, _)| seq).collect();
    assert_eq!(seqs, vec![0, 2, 3, 1, 2, 3]);

    assert_eq!(stats.segments_sent, 4);
    assert_eq!(stats.timeouts, 1);
    assert_eq!(stats.retransmitted_segments, 3);
}

#[tokio::test]
async fn test_rejected_handshake_sends_no_data() {
    let file = temp_file(&sample_data(2500));
    let (addr, receiver) = spawn_receiver(1, no_loss()).await;

    let sender = Sender::with_window(4, 100);
    let result = send_with_deadline(&sender, addr, &file).await;
    let report = receiver.await.unwrap();

    assert!(matches!(result, Err(Error::HandshakeRejected { code: 1 })));
    assert!(report.arrivals.is_empty());
    assert_eq!(sender.phase(), Phase::Failed);
}

#[tokio::test]
async fn test_empty_file_only_signals_completion() {
    let file = temp_file(&[]);
    let (addr, receiver) = spawn_receiver(0, no_loss()).await;

    let sender = Sender::with_window(4, 100);
    let stats = send_with_deadline(&sender, addr, &file).await.unwrap();
    let report = receiver.await.unwrap();

    assert!(report.arrivals.is_empty());
    assert_eq!(report.end_byte, Some(0));
    assert_eq!(stats.segments_sent, 0);
}

#[tokio::test]
async fn test_random_loss_still_delivers_everything() {
    let data = sample_data(20_500);
    let file = temp_file(&data);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let lossy: DropPolicy = Box::new(move |_| rng.gen_bool(0.2));
    let (addr, receiver) = spawn_receiver(0, lossy).await;

    let sender = Sender::new(Config::new(8, 30));
    let stats = send_with_deadline(&sender, addr, &file).await.unwrap();
    let report = receiver.await.unwrap();

    assert_eq!(report.data, data);
    assert_eq!(report.end_byte, Some(0));
    assert_eq!(stats.segments_sent, 21);
}

#[tokio::test]
async fn test_unresponsive_receiver_hits_retransmission_limit() {
    let file = temp_file(&sample_data(1500));
    let (addr, receiver) = spawn_receiver(0, Box::new(|_| true)).await;

    let config = Config {
        max_consecutive_timeouts: Some(3),
        ..Config::new(4, 20)
    };
    let sender = Sender::new(config);
    let result = send_with_deadline(&sender, addr, &file).await;

    assert!(matches!(result, Err(Error::RetransmissionLimit { timeouts: 4 })));
    assert_eq!(sender.phase(), Phase::Failed);

    let stats = sender.last_stats().unwrap();
    assert_eq!(stats.segments_sent, 2);
    assert_eq!(stats.retransmitted_segments, 6);

    // 종료 알림 없이 제어 채널이 닫힘
    let report = receiver.await.unwrap();
    assert_eq!(report.end_byte, None);
    assert!(report.arrivals.is_empty());
}

#[tokio::test]
async fn test_abandoned_send_stops_retransmitting() {
    let file = temp_file(&sample_data(3500));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let udp = UdpSocket::bind(addr).await.unwrap();

    // 핸드셰이크만 수락하고 ACK는 보내지 않음
    let control = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let len = stream.read_u16().await.unwrap() as usize;
        let mut name = vec![0u8; len];
        stream.read_exact(&mut name).await.unwrap();
        stream.write_u8(0).await.unwrap();
        stream
    });

    let sender = Sender::with_window(4, 20);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(150),
        sender.send("127.0.0.1", addr.port(), file.path()),
    )
    .await;
    assert!(abandoned.is_err());
    let _stream = control.await.unwrap();

    // 버리기 전에 쌓인 데이터그램 비우기
    let mut buf = vec![0u8; 2048];
    let mut queued = 0;
    while let Ok(received) =
        tokio::time::timeout(Duration::from_millis(60), udp.recv_from(&mut buf)).await
    {
        received.unwrap();
        queued += 1;
        assert!(queued < 1000, "retransmissions did not stop");
    }
    assert!(queued >= 4);

    let late = tokio::time::timeout(Duration::from_millis(300), udp.recv_from(&mut buf)).await;
    assert!(late.is_err(), "datagram arrived after send() was dropped");
}
