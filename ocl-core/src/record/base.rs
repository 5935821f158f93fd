//! Base implementation of records.
use crate::error::OclError;
use chrono::prelude::{DateTime, Local};
use std::{
    collections::{hash_map::Iter, HashMap},
    convert::Into,
};

/// Represents possible types of values that can be stored in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    /// A single floating-point value, typically used for losses or accuracies.
    Scalar(f32),

    /// A timestamp with local timezone.
    DateTime(DateTime<Local>),

    /// A 1-dimensional array of floating-point values.
    Array1(Vec<f32>),

    /// A 2-dimensional array with its shape, e.g. an accuracy matrix.
    Array2(Vec<f32>, [usize; 2]),

    /// A text value.
    String(String),
}

/// A container for storing key-value pairs of various data types.
///
/// # Examples
///
/// ```rust
/// use ocl_core::record::{Record, RecordValue};
///
/// let mut record = Record::from_scalar("loss_inc", 0.5);
/// record.insert("dot_p", RecordValue::Scalar(-0.1));
///
/// let loss = record.get_scalar("loss_inc").unwrap();
/// assert_eq!(loss, 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record containing a single scalar value.
    pub fn from_scalar(name: impl Into<String>, value: f32) -> Self {
        Self(HashMap::from([(name.into(), RecordValue::Scalar(value))]))
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair into the record.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Returns an iterator over the key-value pairs in the record.
    pub fn iter(&self) -> Iter<'_, String, RecordValue> {
        self.0.iter()
    }

    /// Gets a reference to the value associated with the given key.
    pub fn get(&self, k: &str) -> Option<&RecordValue> {
        self.0.get(k)
    }

    /// Merges two records, consuming both.
    ///
    /// If both records contain the same key, the value from the second record
    /// is kept.
    pub fn merge(self, record: Record) -> Self {
        Record(self.0.into_iter().chain(record.0).collect())
    }

    /// Gets a scalar value from the record.
    pub fn get_scalar(&self, k: &str) -> Result<f32, OclError> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Ok(*v),
            Some(_) => Err(OclError::RecordValueTypeError("Scalar".to_string())),
            None => Err(OclError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 1-dimensional array from the record.
    pub fn get_array1(&self, k: &str) -> Result<Vec<f32>, OclError> {
        match self.0.get(k) {
            Some(RecordValue::Array1(v)) => Ok(v.clone()),
            Some(_) => Err(OclError::RecordValueTypeError("Array1".to_string())),
            None => Err(OclError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a 2-dimensional array and its shape from the record.
    pub fn get_array2(&self, k: &str) -> Result<(Vec<f32>, [usize; 2]), OclError> {
        match self.0.get(k) {
            Some(RecordValue::Array2(v, s)) => Ok((v.clone(), *s)),
            Some(_) => Err(OclError::RecordValueTypeError("Array2".to_string())),
            None => Err(OclError::RecordKeyError(k.to_string())),
        }
    }

    /// Gets a string value from the record.
    pub fn get_string(&self, k: &str) -> Result<String, OclError> {
        match self.0.get(k) {
            Some(RecordValue::String(s)) => Ok(s.clone()),
            Some(_) => Err(OclError::RecordValueTypeError("String".to_string())),
            None => Err(OclError::RecordKeyError(k.to_string())),
        }
    }

    /// Returns `true` if the record contains no key-value pair.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
