//! Loopback server with canned replies, for connection and cluster tests.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::connection::ConnectionConfig;

/// A reply line sent after an optional delay; CRLF is appended.
pub struct Canned {
    delay: Duration,
    reply: String,
}

pub fn now(reply: impl Into<String>) -> Canned {
    after(0, reply)
}

pub fn after(millis: u64, reply: impl Into<String>) -> Canned {
    Canned {
        delay: Duration::from_millis(millis),
        reply: reply.into(),
    }
}

/// Everything a node has received so far.
#[derive(Clone, Default)]
pub struct Seen(Arc<Mutex<SeenInner>>);

#[derive(Default)]
struct SeenInner {
    sessions: usize,
    commands: Vec<Vec<String>>,
}

impl Seen {
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.0.lock().expect("seen lock").commands.clone()
    }

    pub fn sessions(&self) -> usize {
        self.0.lock().expect("seen lock").sessions
    }
}

pub struct FakeNode {
    listener: TcpListener,
    port: u16,
}

impl FakeNode {
    pub fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        Self { listener, port }
    }

    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    pub fn config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::from_addr("127.0.0.1", self.port);
        config.timeout = Duration::from_secs(2);
        config
    }

    /// Accept one connection per script and answer each received command with
    /// the next canned reply. The listener closes once every script is taken.
    pub fn serve(self, sessions: Vec<Vec<Canned>>) -> Seen {
        let seen = Seen::default();
        let recorder = seen.clone();
        thread::spawn(move || {
            for script in sessions {
                let Ok((socket, _)) = self.listener.accept() else {
                    return;
                };
                recorder.0.lock().expect("seen lock").sessions += 1;
                let recorder = recorder.clone();
                thread::spawn(move || answer(socket, script, &recorder));
            }
        });
        seen
    }
}

fn answer(socket: TcpStream, script: Vec<Canned>, seen: &Seen) {
    let mut reader = BufReader::new(socket.try_clone().expect("clone socket"));
    let mut writer = socket;
    for canned in script {
        let Some(command) = read_command(&mut reader) else {
            return;
        };
        seen.0.lock().expect("seen lock").commands.push(command);
        thread::sleep(canned.delay);
        if writer
            .write_all(format!("{}\r\n", canned.reply).as_bytes())
            .is_err()
        {
            return;
        }
    }
}

fn read_command(reader: &mut impl BufRead) -> Option<Vec<String>> {
    let mut header = String::new();
    if reader.read_line(&mut header).ok()? == 0 {
        return None;
    }
    let argc: usize = header.trim_start_matches('*').trim().parse().ok()?;
    let mut args = Vec::with_capacity(argc);
    for _ in 0..argc {
        let mut len = String::new();
        let mut arg = String::new();
        reader.read_line(&mut len).ok()?;
        reader.read_line(&mut arg).ok()?;
        args.push(arg.trim_end_matches("\r\n").to_string());
    }
    Some(args)
}
