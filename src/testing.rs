//! 测试用的记录型假实现

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::bail;

use crate::dns::DnsResponder;
use crate::task::{StdSpawner, TaskEntry, TaskSpawner, TaskSpec};
use crate::wifi::AccessPoint;

pub const DHCP_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BringUp { ssid: String, pass: Option<String> },
    SetAddress(Ipv4Addr, Ipv4Addr),
    TearDown,
    Bind(u16, Ipv4Addr),
    Unbind,
    Spawn(String),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn count_where(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

pub struct FakeAp {
    log: CallLog,
    address: Ipv4Addr,
    up: Arc<AtomicBool>,
    fail_bring_up: Arc<AtomicBool>,
    fail_set_address: Arc<AtomicBool>,
}

impl FakeAp {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            address: DHCP_AP_ADDRESS,
            up: Arc::new(AtomicBool::new(false)),
            fail_bring_up: Arc::new(AtomicBool::new(false)),
            fail_set_address: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the radio is currently up.
    pub fn up_flag(&self) -> Arc<AtomicBool> {
        self.up.clone()
    }

    pub fn fail_bring_up(&self) -> Arc<AtomicBool> {
        self.fail_bring_up.clone()
    }

    pub fn fail_set_address(&self) -> Arc<AtomicBool> {
        self.fail_set_address.clone()
    }
}

impl AccessPoint for FakeAp {
    fn bring_up(&mut self, ssid: &str, passphrase: Option<&str>) -> anyhow::Result<()> {
        self.log.push(Call::BringUp {
            ssid: ssid.to_string(),
            pass: passphrase.map(str::to_string),
        });
        if self.fail_bring_up.load(Ordering::SeqCst) {
            bail!("softAP failed");
        }
        self.address = DHCP_AP_ADDRESS;
        self.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_address(&mut self, address: Ipv4Addr, netmask: Ipv4Addr) -> anyhow::Result<()> {
        self.log.push(Call::SetAddress(address, netmask));
        if self.fail_set_address.load(Ordering::SeqCst) {
            bail!("softAPConfig failed");
        }
        self.address = address;
        Ok(())
    }

    fn tear_down(&mut self) {
        self.log.push(Call::TearDown);
        self.up.store(false, Ordering::SeqCst);
    }

    fn own_address(&self) -> Ipv4Addr {
        self.address
    }
}

pub struct FakeDns {
    log: CallLog,
    fail_bind: Arc<AtomicBool>,
    fail_rounds: Arc<AtomicBool>,
    rounds: Arc<AtomicUsize>,
}

impl FakeDns {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail_bind: Arc::new(AtomicBool::new(false)),
            fail_rounds: Arc::new(AtomicBool::new(false)),
            rounds: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn fail_bind(&self) -> Arc<AtomicBool> {
        self.fail_bind.clone()
    }

    pub fn fail_rounds(&self, fail: bool) {
        self.fail_rounds.store(fail, Ordering::SeqCst);
    }

    /// Service rounds run so far, failed ones included.
    pub fn rounds(&self) -> Arc<AtomicUsize> {
        self.rounds.clone()
    }
}

impl DnsResponder for FakeDns {
    fn bind(&mut self, port: u16, address: Ipv4Addr) -> anyhow::Result<()> {
        self.log.push(Call::Bind(port, address));
        if self.fail_bind.load(Ordering::SeqCst) {
            bail!("no sockets for DNS server available");
        }
        Ok(())
    }

    fn process_next_request(&mut self) -> anyhow::Result<usize> {
        self.rounds.fetch_add(1, Ordering::SeqCst);
        if self.fail_rounds.load(Ordering::SeqCst) {
            bail!("malformed query");
        }
        Ok(0)
    }

    fn unbind(&mut self) {
        self.log.push(Call::Unbind);
    }
}

pub struct FakeSpawner {
    log: CallLog,
    fail: Arc<AtomicBool>,
}

impl FakeSpawner {
    pub fn new(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail(&self) -> Arc<AtomicBool> {
        self.fail.clone()
    }
}

impl TaskSpawner for FakeSpawner {
    fn spawn(&self, spec: &TaskSpec, entry: TaskEntry) -> anyhow::Result<JoinHandle<()>> {
        self.log.push(Call::Spawn(spec.name.clone()));
        if self.fail.load(Ordering::SeqCst) {
            bail!("xTaskCreate failed");
        }
        StdSpawner.spawn(spec, entry)
    }
}
