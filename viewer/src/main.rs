mod framebuffer;
mod halfblock;
mod render;

use std::io::{self, Write};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use lcdcast_core::decode::decode_datagram;
use lcdcast_core::Geometry;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::framebuffer::Framebuffer;
use crate::halfblock::cell_rows;
use crate::render::{render_cells, render_full, render_status};

#[derive(Parser)]
#[command(name = "lcdcast-view", about = "Show an lcdcast stream in the terminal")]
struct Cli {
    /// Address to receive datagrams on
    #[arg(short, long, default_value = "0.0.0.0:4300")]
    bind: SocketAddr,

    /// Display width in pixels
    #[arg(long, default_value_t = lcdcast_core::WIDTH)]
    width: u16,

    /// Display height in pixels
    #[arg(long, default_value_t = lcdcast_core::HEIGHT)]
    height: u16,
}

#[derive(Default)]
struct Counters {
    datagrams: u64,
    records: u64,
    malformed: u64,
    out_of_range: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // per-datagram events are debug-level; the picture owns the terminal while running
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let geometry = Geometry::new(cli.width, cli.height);
    anyhow::ensure!(geometry.pixel_count() > 0, "display geometry must be non-zero");

    let socket = UdpSocket::bind(cli.bind).with_context(|| format!("failed to bind {}", cli.bind))?;
    socket
        .set_read_timeout(Some(Duration::from_millis(15)))
        .context("setting socket timeout")?;
    eprintln!("lcdcast-view: listening on {}", cli.bind);

    let (term_cols, term_rows) = terminal::size().context("reading terminal size")?;
    let rows_needed = cell_rows(geometry.height) + 1;
    if term_cols < geometry.width || term_rows < rows_needed {
        eprintln!(
            "Warning: terminal is {term_cols}x{term_rows} but the display needs {}x{rows_needed}.",
            geometry.width
        );
    }

    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        orig_hook(info);
    }));

    let mut stdout = io::stdout();
    terminal::enable_raw_mode().context("enable raw mode")?;
    crossterm::execute!(stdout, terminal::EnterAlternateScreen, crossterm::cursor::Hide)
        .context("enter alt screen")?;

    let result = view_loop(&socket, geometry, &mut stdout);

    cleanup_terminal();

    let counters = result?;
    info!(
        datagrams = counters.datagrams,
        records = counters.records,
        malformed = counters.malformed,
        out_of_range = counters.out_of_range,
        "viewer closed"
    );
    Ok(())
}

fn view_loop(socket: &UdpSocket, geometry: Geometry, stdout: &mut impl Write) -> anyhow::Result<Counters> {
    let mut fb = Framebuffer::new(geometry);
    let mut counters = Counters::default();
    let mut render_buf = Vec::with_capacity(geometry.pixel_count() * 20);
    let mut datagram = vec![0u8; 65535];
    let status_row = cell_rows(geometry.height);

    render_full(&fb, &mut render_buf);
    stdout.write_all(&render_buf)?;
    stdout.flush()?;

    loop {
        if event::poll(Duration::ZERO).context("polling events")? {
            if let Event::Key(KeyEvent { code, modifiers, .. }) = event::read().context("reading event")? {
                match code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => break,
                    _ => {}
                }
            }
        }

        let len = match socket.recv(&mut datagram) {
            Ok(len) => len,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
            Err(e) => return Err(e).context("receiving datagram"),
        };
        counters.datagrams += 1;

        let records = match decode_datagram(&datagram[..len]) {
            Ok(records) => records,
            Err(e) => {
                counters.malformed += 1;
                debug!(error = %e, "dropping malformed datagram");
                continue;
            }
        };
        counters.records += records.len() as u64;

        let applied = fb.apply(&records);
        counters.out_of_range += applied.out_of_range as u64;

        render_cells(&fb, &applied.cells, &mut render_buf);
        let status = format!(
            "datagrams {}  records {}  malformed {}  out of range {}  (q to quit)",
            counters.datagrams, counters.records, counters.malformed, counters.out_of_range
        );
        render_status(status_row, &status, &mut render_buf);
        stdout.write_all(&render_buf)?;
        stdout.flush()?;
    }

    Ok(counters)
}

fn cleanup_terminal() {
    let _ = terminal::disable_raw_mode();
    let _ = crossterm::execute!(
        io::stdout(),
        crossterm::cursor::Show,
        terminal::LeaveAlternateScreen
    );
}
