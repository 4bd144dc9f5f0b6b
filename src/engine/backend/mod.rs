//! Collaborator abstractions for the measurement core.
//!
//! The engine reaches the outside world only through these traits: the
//! orientation sensor, the screen-orientation source, the renderer and the
//! clock. Desktop stubs implement all of them for tests, the CLI and fixture
//! replay.

mod clock;
mod desktop_stub;
mod render;
mod sensor;

pub use clock::{Clock, SystemClock, Timestamp};
pub use desktop_stub::{
    ChannelSensorSource, ManualClock, ManualModeProvider, RecordingRenderer, RenderCall,
};
pub use render::{render_reading, Button, ButtonLabel, Renderer};
pub use sensor::{
    ConsumerKind, OrientationModeProvider, PermissionState, SensorCapability, SensorSource,
    SensorSubscription,
};
