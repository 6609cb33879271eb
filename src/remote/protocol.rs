use crate::console::Input;
use crate::console::Savestate;
use byteorder::LE;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use std::io::Read;
use std::io::Write;

/// one unit of helper work: evaluate a single candidate against the
/// full futures ensemble from the given state
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub state: Savestate,
    pub next: Vec<Input>,
    pub futures: Vec<Vec<Input>>,
}

/// the helper's answer. per_future must cover every future in the
/// request; partial vectors are rejected by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub immediate: f64,
    pub per_future: Vec<f64>,
}

const REQUEST_MAGIC: u32 = u32::from_le_bytes(*b"JYRQ");
const RESPONSE_MAGIC: u32 = u32::from_le_bytes(*b"JYRS");

/// hard cap on any single length field, so a corrupt or hostile frame
/// cannot convince us to allocate unbounded memory
const MAX_FIELD: u32 = 1 << 26;

fn read_bytes<R: Read>(reader: &mut R) -> anyhow::Result<Vec<u8>> {
    let length = reader.read_u32::<LE>()?;
    anyhow::ensure!(length <= MAX_FIELD, "oversized field ({} bytes)", length);
    let mut bytes = vec![0u8; length as usize];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> anyhow::Result<()> {
    writer.write_u32::<LE>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn inputs_to_bytes(inputs: &[Input]) -> Vec<u8> {
    inputs.iter().map(|&i| u8::from(i)).collect()
}

fn inputs_from_bytes(bytes: Vec<u8>) -> Vec<Input> {
    bytes.into_iter().map(Input::from).collect()
}

impl Request {
    pub fn write<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_u32::<LE>(REQUEST_MAGIC)?;
        write_bytes(writer, self.state.bytes())?;
        write_bytes(writer, &inputs_to_bytes(&self.next))?;
        writer.write_u32::<LE>(self.futures.len() as u32)?;
        for future in self.futures.iter() {
            write_bytes(writer, &inputs_to_bytes(future))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> anyhow::Result<Self> {
        let magic = reader.read_u32::<LE>()?;
        anyhow::ensure!(magic == REQUEST_MAGIC, "bad request magic {:08x}", magic);
        let state = Savestate::from(read_bytes(reader)?);
        let next = inputs_from_bytes(read_bytes(reader)?);
        let count = reader.read_u32::<LE>()?;
        anyhow::ensure!(count <= MAX_FIELD, "oversized future count ({})", count);
        let futures = (0..count)
            .map(|_| read_bytes(reader).map(inputs_from_bytes))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { state, next, futures })
    }
}

impl Response {
    pub fn write<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_u32::<LE>(RESPONSE_MAGIC)?;
        writer.write_f64::<LE>(self.immediate)?;
        writer.write_u32::<LE>(self.per_future.len() as u32)?;
        for &total in self.per_future.iter() {
            writer.write_f64::<LE>(total)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> anyhow::Result<Self> {
        let magic = reader.read_u32::<LE>()?;
        anyhow::ensure!(magic == RESPONSE_MAGIC, "bad response magic {:08x}", magic);
        let immediate = reader.read_f64::<LE>()?;
        let count = reader.read_u32::<LE>()?;
        anyhow::ensure!(count <= MAX_FIELD, "oversized future count ({})", count);
        let per_future = (0..count)
            .map(|_| reader.read_f64::<LE>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { immediate, per_future })
    }
}
