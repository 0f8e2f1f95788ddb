//! Length-prefixed binary framing.
//!
//! Integers are big-endian; variable-length fields carry a `u32` length prefix.

use std::convert::TryFrom;

use rsa::BigUint;

use crate::Error;

#[derive(Clone, Debug, Default)]
pub struct FrameWriter {
    buf: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        FrameWriter::default()
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_be_bytes());
        self
    }

    /// Writes `data` verbatim, without a length prefix.
    pub fn put_raw(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> Result<&mut Self, Error> {
        let len = u32::try_from(data.len()).map_err(|_| Error::EncodingError)?;
        self.put_u32(len);
        Ok(self.put_raw(data))
    }

    pub fn put_biguint(&mut self, v: &BigUint) -> Result<&mut Self, Error> {
        self.put_bytes(&v.to_bytes_be())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Clone, Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        FrameReader { data }
    }

    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn get_raw(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if self.data.len() < len {
            return Err(Error::UnsupportedFormat);
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    pub fn get_u8(&mut self) -> Result<u8, Error> {
        Ok(self.get_raw(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32, Error> {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(self.get_raw(4)?);
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn get_bytes(&mut self) -> Result<&'a [u8], Error> {
        let len = self.get_u32()? as usize;
        self.get_raw(len)
    }

    pub fn get_biguint(&mut self) -> Result<BigUint, Error> {
        Ok(BigUint::from_bytes_be(self.get_bytes()?))
    }

    /// Fails if any input is left over.
    pub fn finish(self) -> Result<(), Error> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat)
        }
    }
}
