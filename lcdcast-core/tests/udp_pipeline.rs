use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use lcdcast_core::decode::decode_datagram;
use lcdcast_core::{
    run_renderer, DisplayDriver, Frame, Geometry, Rgb, Rgb565, StreamConfig, UdpTransport,
};

fn receiver() -> UdpSocket {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    socket
}

fn recv_all(socket: &UdpSocket, until: Instant) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = [0u8; 65535];
    while Instant::now() < until {
        match socket.recv(&mut buf) {
            Ok(n) => out.push(buf[..n].to_vec()),
            Err(_) => continue,
        }
    }
    out
}

#[test]
fn frames_reach_the_display_as_bounded_batches() {
    let display = receiver();
    let geometry = Geometry::new(32, 16);
    let config = StreamConfig {
        display: display.local_addr().unwrap(),
        geometry,
        refresh_rate: 100,
        max_block_size: 50,
        ..Default::default()
    };
    let transport = UdpTransport::new(config.display).unwrap();
    let driver = DisplayDriver::start(config, transport).unwrap();

    let mut frames = vec![Frame::filled(geometry, Rgb::new(0, 0, 255))];
    let mut second = frames[0].clone();
    second.set(geometry, 31, 15, Rgb::new(255, 0, 0));
    frames.push(second);
    let mut queue = frames.into_iter();
    let mut source = move |_: Geometry| -> anyhow::Result<Option<Frame>> { Ok(queue.next()) };

    let sender = driver.frames();
    let produced = run_renderer(&mut source, geometry, 100.0, &sender, &driver.stop_flag()).unwrap();
    drop(sender);
    assert_eq!(produced, 2);

    let datagrams = recv_all(&display, Instant::now() + Duration::from_millis(800));
    let stats = driver.join().unwrap();

    let mut framebuffer = vec![None; geometry.pixel_count()];
    let mut records = 0;
    for datagram in &datagrams {
        let batch = decode_datagram(datagram).unwrap();
        assert!(batch.len() <= 50);
        for rec in batch {
            framebuffer[rec.index(geometry).unwrap()] = Some(rec.color);
            records += 1;
        }
    }

    assert_eq!(records, 512 + 1);
    assert_eq!(stats.records_emitted, 513);
    assert!(framebuffer[..511].iter().all(|c| *c == Some(Rgb565(0x1f))));
    assert_eq!(framebuffer[511], Some(Rgb565(0xf800)));
}

#[test]
fn idle_stream_sends_empty_datagrams() {
    let display = receiver();
    let config = StreamConfig {
        display: display.local_addr().unwrap(),
        geometry: Geometry::new(4, 4),
        refresh_rate: 20,
        ..Default::default()
    };
    let transport = UdpTransport::new(config.display).unwrap();
    let driver = DisplayDriver::start(config, transport).unwrap();

    let datagrams = recv_all(&display, Instant::now() + Duration::from_millis(500));
    driver.stop();
    assert!(driver.stop_flag().load(Ordering::Relaxed));
    let stats = driver.join().unwrap();

    assert!(!datagrams.is_empty());
    assert!(datagrams.iter().all(|d| d.is_empty()));
    assert!(stats.underflows >= datagrams.len() as u64);
}
