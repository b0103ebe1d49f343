//! Native mirrors of the foreign fixed-layout records.

use std::ffi::{c_char, c_int};
use std::mem::{align_of, size_of};

use serde::{Deserialize, Serialize};

use super::layout::{RecordReader, RecordWriter};
use super::Marshal;
use crate::error::Result;

/// Capacity of `c_data_t::name`, including the terminating NUL.
pub const DATA_NAME_CAPACITY: usize = 256;

/// Capacity of `Person::name`, including the terminating NUL.
pub const PERSON_NAME_CAPACITY: usize = 50;

/// Declared domain of `Person::age`.
pub const PERSON_AGE_DOMAIN: std::ops::RangeInclusive<i32> = 0..=150;

/// `struct c_data_t { int id; char name[256]; double value; bool processed; }`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawDataRecord {
    pub id: c_int,
    pub name: [c_char; DATA_NAME_CAPACITY],
    pub value: f64,
    pub processed: bool,
}

/// `struct Point { int x; int y; }`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPoint {
    pub x: c_int,
    pub y: c_int,
}

/// `struct Person { char name[50]; int age; struct Point location; }`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RawPerson {
    pub name: [c_char; PERSON_NAME_CAPACITY],
    pub age: c_int,
    pub location: RawPoint,
}

const _: () = assert!(size_of::<RawDataRecord>() == DataRecord::SIZE);
const _: () = assert!(align_of::<RawDataRecord>() == DataRecord::ALIGN);
const _: () = assert!(size_of::<RawPoint>() == Point::SIZE);
const _: () = assert!(size_of::<RawPerson>() == PersonRecord::SIZE);
const _: () = assert!(align_of::<RawPerson>() == PersonRecord::ALIGN);

/// Native value for `c_data_t`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: i32,
    pub name: String,
    pub value: f64,
    pub processed: bool,
}

impl Marshal for DataRecord {
    const NAME: &'static str = "c_data_t";
    // id(4) + name(256) + pad(4) + value(8) + processed(1) + tail pad(7)
    const SIZE: usize = 280;
    const ALIGN: usize = 8;

    fn write_fields(&self, w: &mut RecordWriter) -> Result<()> {
        w.put_i32("id", self.id)?;
        w.put_str("name", &self.name, DATA_NAME_CAPACITY)?;
        w.put_f64("value", self.value)?;
        w.put_bool("processed", self.processed)
    }

    fn read_fields(r: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            id: r.get_i32("id")?,
            name: r.get_str("name", DATA_NAME_CAPACITY)?,
            value: r.get_f64("value")?,
            processed: r.get_bool("processed")?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Marshal for Point {
    const NAME: &'static str = "Point";
    const SIZE: usize = 8;
    const ALIGN: usize = 4;

    fn write_fields(&self, w: &mut RecordWriter) -> Result<()> {
        w.put_i32("x", self.x)?;
        w.put_i32("y", self.y)
    }

    fn read_fields(r: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            x: r.get_i32("x")?,
            y: r.get_i32("y")?,
        })
    }
}

/// Native value for `struct Person`, with a nested [`Point`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub name: String,
    pub age: i32,
    pub location: Point,
}

impl Marshal for PersonRecord {
    const NAME: &'static str = "Person";
    // name(50) + pad(2) + age(4) + location(8)
    const SIZE: usize = 64;
    const ALIGN: usize = 4;

    fn write_fields(&self, w: &mut RecordWriter) -> Result<()> {
        w.put_str("name", &self.name, PERSON_NAME_CAPACITY)?;
        w.put_i32_in("age", self.age, PERSON_AGE_DOMAIN)?;
        w.put_record(&self.location)
    }

    fn read_fields(r: &mut RecordReader<'_>) -> Result<Self> {
        Ok(Self {
            name: r.get_str("name", PERSON_NAME_CAPACITY)?,
            age: r.get_i32_in("age", PERSON_AGE_DOMAIN)?,
            location: r.get_record()?,
        })
    }
}
