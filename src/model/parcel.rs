//! Flat little-endian byte buffer used to marshal property bags across the
//! process boundary.

use crate::model::error::{WmError, WmResult};
use crate::sys::geometry::Rect;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Parcel {
    data: Vec<u8>,
    read_pos: usize,
}

impl Parcel {
    pub fn new() -> Self { Self::default() }

    pub fn from_bytes(data: Vec<u8>) -> Self { Parcel { data, read_pos: 0 } }

    pub fn as_bytes(&self) -> &[u8] { &self.data }

    pub fn len(&self) -> usize { self.data.len() }

    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn remaining(&self) -> usize { self.data.len() - self.read_pos }

    pub fn write_u32(&mut self, v: u32) { self.data.extend_from_slice(&v.to_le_bytes()); }

    pub fn write_u64(&mut self, v: u64) { self.data.extend_from_slice(&v.to_le_bytes()); }

    pub fn write_i32(&mut self, v: i32) { self.data.extend_from_slice(&v.to_le_bytes()); }

    pub fn write_f32(&mut self, v: f32) { self.data.extend_from_slice(&v.to_le_bytes()); }

    pub fn write_bool(&mut self, v: bool) { self.write_u32(v as u32); }

    pub fn write_string(&mut self, v: &str) {
        self.write_u32(v.len() as u32);
        self.data.extend_from_slice(v.as_bytes());
    }

    pub fn write_rect(&mut self, r: &Rect) {
        self.write_i32(r.x);
        self.write_i32(r.y);
        self.write_u32(r.width);
        self.write_u32(r.height);
    }

    fn take<const N: usize>(&mut self) -> WmResult<[u8; N]> {
        let end = self.read_pos.checked_add(N).ok_or(WmError::Parcel)?;
        let bytes = self.data.get(self.read_pos..end).ok_or(WmError::Parcel)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.read_pos = end;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> WmResult<u32> { Ok(u32::from_le_bytes(self.take()?)) }

    pub fn read_u64(&mut self) -> WmResult<u64> { Ok(u64::from_le_bytes(self.take()?)) }

    pub fn read_i32(&mut self) -> WmResult<i32> { Ok(i32::from_le_bytes(self.take()?)) }

    pub fn read_f32(&mut self) -> WmResult<f32> { Ok(f32::from_le_bytes(self.take()?)) }

    pub fn read_bool(&mut self) -> WmResult<bool> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(WmError::Parcel),
        }
    }

    pub fn read_string(&mut self) -> WmResult<String> {
        let len = self.read_u32()? as usize;
        let end = self.read_pos.checked_add(len).ok_or(WmError::Parcel)?;
        let bytes = self.data.get(self.read_pos..end).ok_or(WmError::Parcel)?;
        let s = std::str::from_utf8(bytes).map_err(|_| WmError::Parcel)?.to_owned();
        self.read_pos = end;
        Ok(s)
    }

    pub fn read_rect(&mut self) -> WmResult<Rect> {
        Ok(Rect {
            x: self.read_i32()?,
            y: self.read_i32()?,
            width: self.read_u32()?,
            height: self.read_u32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_in_write_order() {
        let mut p = Parcel::new();
        p.write_u32(7);
        p.write_string("dock");
        p.write_rect(&Rect::new(-3, 4, 5, 6));
        p.write_bool(true);
        p.write_f32(0.5);

        let mut r = Parcel::from_bytes(p.as_bytes().to_vec());
        assert_eq!(r.read_u32(), Ok(7));
        assert_eq!(r.read_string().as_deref(), Ok("dock"));
        assert_eq!(r.read_rect(), Ok(Rect::new(-3, 4, 5, 6)));
        assert_eq!(r.read_bool(), Ok(true));
        assert_eq!(r.read_f32(), Ok(0.5));
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn truncated_input_is_an_error() {
        let mut r = Parcel::from_bytes(vec![1, 0]);
        assert_eq!(r.read_u32(), Err(WmError::Parcel));

        let mut p = Parcel::new();
        p.write_u32(100);
        let mut r = Parcel::from_bytes(p.as_bytes().to_vec());
        assert_eq!(r.read_string(), Err(WmError::Parcel));
    }
}
