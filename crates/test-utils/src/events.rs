use std::sync::{Arc, Mutex};

/// Something a fake collaborator observed, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BuildStarted { image: String, tag: String },
    BuildFinished { image: String, tag: String },
    Pushed { image: String, tag: String },
    RegistryStarted,
    RegistryStopped,
}

/// Shared, ordered event log for fakes.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    /// Position of the first event equal to `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == event)
    }

    /// Images for which a build started, in start order.
    pub fn started_images(&self) -> Vec<String> {
        let mut images = Vec::new();
        for event in self.events() {
            if let Event::BuildStarted { image, .. } = event {
                if !images.contains(&image) {
                    images.push(image);
                }
            }
        }
        images
    }

    pub fn pushed(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Pushed { image, tag } => Some((image, tag)),
                _ => None,
            })
            .collect()
    }
}

pub fn build_started(image: &str, tag: &str) -> Event {
    Event::BuildStarted {
        image: image.to_string(),
        tag: tag.to_string(),
    }
}

pub fn pushed(image: &str, tag: &str) -> Event {
    Event::Pushed {
        image: image.to_string(),
        tag: tag.to_string(),
    }
}
