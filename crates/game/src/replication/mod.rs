mod property;
mod registry;

pub use property::{
    DirtyMask, Replicated, ReplicatedAngles, ReplicatedMotion, ReplicatedPose, ReplicatedString,
    ReplicatedVec3, SyncMode, WireValue,
};
pub use registry::Registry;
