use serde::Serialize;

use crate::position::Fix;
use crate::track::PathPoint;

/// Where the map looks before the first fix arrives.
pub const DEFAULT_CENTER: (f64, f64) = (20.5937, 78.9629);
pub const DEFAULT_ZOOM: u8 = 5;
/// Street-level zoom applied on the first fix.
pub const FIX_ZOOM: u8 = 15;

/// Snapshot of everything the map page needs to render.
#[derive(Clone, Debug, Serialize)]
pub struct ViewState {
    pub center: (f64, f64),
    pub zoom: u8,
    pub marker: Option<(f64, f64)>,
    pub speed_kmh: f64,
    pub recording: bool,
    pub points_recorded: usize,
    pub path: Vec<PathPoint>,
}

/// What the map page renders: one marker at the current position, one
/// polyline for the recorded path. The polyline is always replaced from the
/// full path, never incrementally patched.
///
/// Every visible change bumps `version`; the map server uses it to answer
/// conditional requests with 304 when nothing changed.
pub struct MapView {
    center: (f64, f64),
    zoom: u8,
    marker: Option<(f64, f64)>,
    speed_kmh: f64,
    recording: bool,
    path: Vec<PathPoint>,
    version: u64,
}

impl MapView {
    pub fn new() -> Self {
        MapView {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
            marker: None,
            speed_kmh: 0.0,
            recording: false,
            path: Vec::new(),
            version: 0,
        }
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Move the marker and re-center on the fix. The first fix zooms in to
    /// street level; later fixes keep whatever zoom the viewer chose.
    pub fn set_position(&mut self, fix: &Fix) {
        let position = (fix.latitude, fix.longitude);
        if self.marker == Some(position) && self.speed_kmh == fix.speed_kmh {
            return;
        }
        if self.marker.is_none() {
            self.zoom = FIX_ZOOM;
        }
        self.marker = Some(position);
        self.center = position;
        self.speed_kmh = fix.speed_kmh;
        self.bump();
    }

    pub fn replace_path(&mut self, path: &[PathPoint]) {
        if self.path == path {
            return;
        }
        self.path = path.to_vec();
        self.bump();
    }

    pub fn set_recording(&mut self, recording: bool) {
        if self.recording != recording {
            self.recording = recording;
            self.bump();
        }
    }

    pub fn get_current_version(&self) -> u64 {
        self.version
    }

    pub fn get_version_string(&self) -> String {
        format!("\"{:x}\"", self.version)
    }

    pub fn parse_version_string(version_str: &str) -> Option<u64> {
        let cleaned = version_str.trim_matches('"');
        u64::from_str_radix(cleaned, 16).ok()
    }

    /// `None` when the client's version is current, otherwise the full state
    /// plus the version string to hand back as an ETag.
    pub fn get_state_if_changed(&self, client_version: Option<&str>) -> Option<(ViewState, String)> {
        match client_version {
            Some(v_str) if Self::parse_version_string(v_str) == Some(self.version) => None,
            _ => Some((self.state(), self.get_version_string())),
        }
    }

    pub fn state(&self) -> ViewState {
        ViewState {
            center: self.center,
            zoom: self.zoom,
            marker: self.marker,
            speed_kmh: self.speed_kmh,
            recording: self.recording,
            points_recorded: self.path.len(),
            path: self.path.clone(),
        }
    }
}
