//! Native ODIM HDF5 reading using the hdf5 library.
//!
//! The file handle is owned by [`OdimReader`] and released when the reader
//! is dropped, so every exit path (including `?` early returns) closes it.

use std::path::Path;
use std::sync::Once;

use hdf5::types::{FixedAscii, FixedUnicode, FloatSize, TypeDescriptor, VarLenAscii, VarLenUnicode};
use tracing::debug;

use crate::attrs::{AttrMap, AttrValue};
use crate::codec::RawSamples;
use crate::error::{OdimError, OdimResult};
use crate::source::{MetaGroup, ProfileSource};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when probing an attribute
/// that does not exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// This function disables that output by calling H5Eset_auto2 with null handlers.
/// It only needs to be called once per process, but is safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Metadata groups inside a dataset that are not data groups.
const NON_DATA_GROUPS: [&str; 3] = ["what", "where", "how"];

/// An open ODIM HDF5 file.
pub struct OdimReader {
    file: hdf5::File,
    identity: String,
}

impl OdimReader {
    /// Open a file; failure is reported as an unreadable container.
    pub fn open(path: impl AsRef<Path>) -> OdimResult<Self> {
        silence_hdf5_errors();

        let path = path.as_ref();
        let identity = path.display().to_string();
        let file = hdf5::File::open(path).map_err(|e| OdimError::Unreadable {
            path: identity.clone(),
            message: e.to_string(),
        })?;

        debug!(path = %identity, "Opened ODIM file");
        Ok(Self { file, identity })
    }

    /// Open a file, run `f` against it and close it again.
    pub fn read_with<T>(
        path: impl AsRef<Path>,
        f: impl FnOnce(&OdimReader) -> OdimResult<T>,
    ) -> OdimResult<T> {
        let reader = Self::open(path)?;
        f(&reader)
    }

    fn decode_err(&self, location: &str, err: hdf5::Error) -> OdimError {
        OdimError::Decode {
            location: format!("{}:{}", self.identity, location),
            message: err.to_string(),
        }
    }

    fn group(&self, location: &str) -> OdimResult<hdf5::Group> {
        self.file
            .group(location)
            .map_err(|e| self.decode_err(location, e))
    }

    fn read_attrs(&self, location: &str) -> OdimResult<AttrMap> {
        let group = self.group(location)?;
        let names = group
            .attr_names()
            .map_err(|e| self.decode_err(location, e))?;

        let mut attrs = AttrMap::new();
        for name in names {
            let attr = group
                .attr(&name)
                .map_err(|e| self.decode_err(&format!("{}@{}", location, name), e))?;
            match read_attr_value(&attr) {
                Ok(Some(value)) => {
                    attrs.insert(name, value);
                }
                Ok(None) => {
                    debug!(location, attribute = %name, "Skipping attribute with unsupported type");
                }
                Err(e) => return Err(self.decode_err(&format!("{}@{}", location, name), e)),
            }
        }
        Ok(attrs)
    }
}

fn trim_nul(s: &str) -> String {
    s.trim_end_matches('\0').trim_end().to_string()
}

fn first_text<T, F>(values: Vec<T>, f: F) -> AttrValue
where
    F: Fn(&T) -> &str,
{
    AttrValue::Text(values.first().map(|v| trim_nul(f(v))).unwrap_or_default())
}

/// Read an attribute into an [`AttrValue`]; `None` for types ODIM never uses.
fn read_attr_value(attr: &hdf5::Attribute) -> hdf5::Result<Option<AttrValue>> {
    let descriptor = attr.dtype()?.to_descriptor()?;
    let value = match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            let mut values = attr.read_raw::<i64>()?;
            if values.len() == 1 {
                AttrValue::Int(values.remove(0))
            } else {
                AttrValue::Ints(values)
            }
        }
        TypeDescriptor::Boolean => {
            let values = attr.read_raw::<bool>()?;
            AttrValue::Int(values.first().copied().unwrap_or(false) as i64)
        }
        TypeDescriptor::Float(_) => {
            let mut values = attr.read_raw::<f64>()?;
            if values.len() == 1 {
                AttrValue::Float(values.remove(0))
            } else {
                AttrValue::Floats(values)
            }
        }
        TypeDescriptor::FixedAscii(_) => {
            first_text(attr.read_raw::<FixedAscii<1024>>()?, |v| v.as_str())
        }
        TypeDescriptor::FixedUnicode(_) => {
            first_text(attr.read_raw::<FixedUnicode<1024>>()?, |v| v.as_str())
        }
        TypeDescriptor::VarLenAscii => first_text(attr.read_raw::<VarLenAscii>()?, |v| v.as_str()),
        TypeDescriptor::VarLenUnicode => {
            first_text(attr.read_raw::<VarLenUnicode>()?, |v| v.as_str())
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Keep the first column of a 2-D `(levels, n)` array.
fn first_column<T: Copy>(values: Vec<T>, shape: &[usize]) -> Vec<T> {
    match shape {
        [_, cols] if *cols > 1 => values.into_iter().step_by(*cols).collect(),
        _ => values,
    }
}

impl ProfileSource for OdimReader {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn root_groups(&self) -> OdimResult<Vec<String>> {
        self.file
            .member_names()
            .map_err(|e| self.decode_err("/", e))
    }

    fn root_attrs(&self, group: MetaGroup) -> OdimResult<AttrMap> {
        self.read_attrs(group.as_str())
    }

    fn data_names(&self, dataset: &str) -> OdimResult<Vec<String>> {
        let names = self
            .group(dataset)?
            .member_names()
            .map_err(|e| self.decode_err(dataset, e))?;
        Ok(names
            .into_iter()
            .filter(|name| !NON_DATA_GROUPS.contains(&name.as_str()))
            .collect())
    }

    fn data_attrs(&self, dataset: &str, data: &str) -> OdimResult<AttrMap> {
        self.read_attrs(&format!("{}/{}/what", dataset, data))
    }

    fn data_samples(&self, dataset: &str, data: &str) -> OdimResult<RawSamples> {
        let location = format!("{}/{}/data", dataset, data);
        let ds = self
            .file
            .dataset(&location)
            .map_err(|e| self.decode_err(&location, e))?;
        let shape = ds.shape();
        let descriptor = ds
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(|e| self.decode_err(&location, e))?;

        let samples = match descriptor {
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => RawSamples::Integer(
                first_column(
                    ds.read_raw::<i64>()
                        .map_err(|e| self.decode_err(&location, e))?,
                    &shape,
                ),
            ),
            TypeDescriptor::Float(FloatSize::U4) => RawSamples::Float32(first_column(
                ds.read_raw::<f32>()
                    .map_err(|e| self.decode_err(&location, e))?,
                &shape,
            )),
            TypeDescriptor::Float(_) => RawSamples::Float64(first_column(
                ds.read_raw::<f64>()
                    .map_err(|e| self.decode_err(&location, e))?,
                &shape,
            )),
            other => {
                return Err(OdimError::Decode {
                    location: format!("{}:{}", self.identity, location),
                    message: format!("unsupported sample type {:?}", other),
                })
            }
        };
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_hdf5_errors_is_idempotent() {
        silence_hdf5_errors();
        silence_hdf5_errors();
    }

    #[test]
    fn test_first_column() {
        assert_eq!(first_column(vec![1, 2, 3, 4, 5, 6], &[3, 2]), vec![1, 3, 5]);
        assert_eq!(first_column(vec![1, 2, 3], &[3, 1]), vec![1, 2, 3]);
        assert_eq!(first_column(vec![1, 2, 3], &[3]), vec![1, 2, 3]);
    }

    #[test]
    fn test_trim_nul() {
        assert_eq!(trim_nul("VP\0\0"), "VP");
    }

    #[test]
    fn test_open_missing_file_is_unreadable() {
        let err = OdimReader::open("/nonexistent/nope.h5").err().unwrap();
        assert_eq!(err.code(), "unreadable_container");
    }
}
