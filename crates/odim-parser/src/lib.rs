//! Reader for ODIM HDF5 vertical profile (VP) files.
//!
//! A VP file has root `what`/`where`/`how` metadata groups and a
//! `dataset1` group whose data groups each hold one quantity, tagged by
//! `what/quantity`, with its own `nodata`/`undetect`/`gain`/`offset`
//! coding. Heights are the quantity `HGHT`.
//!
//! ```ignore
//! use odim_parser::{check_vp_odim, BirdProfile, OdimReader};
//!
//! let reader = OdimReader::open("bejab_vp_20230101T000500Z_0x9.h5")?;
//! check_vp_odim(&reader)?;
//! let profile = BirdProfile::from_source(&reader, "bejab_vp_20230101T000500Z_0x9.h5")?;
//! ```

pub mod attrs;
pub mod codec;
pub mod error;
pub mod memory;
pub mod native;
pub mod profile;
pub mod source;

pub use attrs::{AttrMap, AttrValue};
pub use codec::{decode, Number, ProfileValue, RawSamples, SampleCoding};
pub use error::{OdimError, OdimResult};
pub use memory::MemoryProfile;
pub use native::{silence_hdf5_errors, OdimReader};
pub use profile::{BirdProfile, HEIGHT_QUANTITY, RADAR_NODE_KEY};
pub use source::{check_vp_odim, parse_odim_datetime, parse_source, MetaGroup, ProfileSource};
