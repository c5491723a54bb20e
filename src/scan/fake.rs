use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use super::decoder::{
    CameraConfig, DecodeEvent, DecodeSink, Decoder, DecoderError, DecoderFactory, ScanConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Works,
    RefuseStart,
    /// Acquires the camera, then never reports back.
    Hang,
    FailRelease,
}

/// A single physical camera shared by every decoder the factory hands out.
#[derive(Debug)]
pub struct FakeCamera {
    open: AtomicUsize,
    overlapped: AtomicBool,
    behaviour: Mutex<Behaviour>,
    sink: Mutex<Option<DecodeSink>>,
    pub last_camera: Mutex<Option<CameraConfig>>,
}

impl FakeCamera {
    pub fn new(behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            open: AtomicUsize::new(0),
            overlapped: AtomicBool::new(false),
            behaviour: Mutex::new(behaviour),
            sink: Mutex::new(None),
            last_camera: Mutex::new(None),
        })
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Whether two acquisitions were ever held at once.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    /// Sends an event through the most recently started decoder.
    pub fn emit(&self, event: DecodeEvent) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink.send(event),
            None => false,
        }
    }

    fn acquire(&self) {
        if self.open.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlapped.store(true, Ordering::SeqCst);
        }
    }

    fn release(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeDecoder {
    camera: Arc<FakeCamera>,
    holding: bool,
}

#[async_trait]
impl Decoder for FakeDecoder {
    async fn start(
        &mut self,
        camera: &CameraConfig,
        _scan: &ScanConfig,
        sink: DecodeSink,
    ) -> Result<(), DecoderError> {
        let behaviour = *self.camera.behaviour.lock().unwrap();
        *self.camera.last_camera.lock().unwrap() = Some(camera.clone());
        if behaviour == Behaviour::RefuseStart {
            return Err(DecoderError::Camera("NotAllowedError: permission denied".into()));
        }
        self.camera.acquire();
        self.holding = true;
        *self.camera.sink.lock().unwrap() = Some(sink);
        if behaviour == Behaviour::Hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DecoderError> {
        if *self.camera.behaviour.lock().unwrap() == Behaviour::FailRelease {
            return Err(DecoderError::Camera("device busy".into()));
        }
        if std::mem::take(&mut self.holding) {
            self.camera.release();
        }
        Ok(())
    }

    fn clear(&mut self) {}
}

#[derive(Debug, Clone)]
pub struct FakeFactory {
    pub camera: Arc<FakeCamera>,
}

impl FakeFactory {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            camera: FakeCamera::new(behaviour),
        }
    }
}

impl DecoderFactory for FakeFactory {
    fn create(&self, _viewport: &str) -> Box<dyn Decoder> {
        Box::new(FakeDecoder {
            camera: self.camera.clone(),
            holding: false,
        })
    }
}
