pub mod collab;
pub mod digest;
pub mod run;

pub use collab::{
    ChannelBatch, Deliverer, DeliveryTarget, Extractor, FileDeliverer, FixtureExtractor,
};
pub use digest::{DigestOutput, GlobalDigest, PersonalizedDigest};
pub use run::{Pipeline, RunSummary};
