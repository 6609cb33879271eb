use crate::Weight;
use crate::console::Input;
use crate::console::Memory;
use crate::console::Savestate;
use crate::search::Checkpoint;
use byteorder::LE;
use byteorder::ReadBytesExt;
use byteorder::WriteBytesExt;
use std::io::Read;
use std::io::Write;
use std::path::Path;

/// the pfstate binary snapshot: everything an interrupted run needs
/// to resume byte-exact. all integers little-endian; motif weights as
/// raw IEEE-754 bytes; movie inputs one byte per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub game: String,
    pub watermark: i32,
    pub movie: Vec<Input>,
    pub subtitles: Vec<String>,
    pub memories: Vec<Memory>,
    pub checkpoint: Checkpoint,
    pub motifs: Vec<(Weight, Vec<Input>)>,
    pub nfutures: u32,
    pub rng: Vec<u8>,
}

impl Snapshot {
    const MAGIC: &'static [u8; 4] = b"PFST";

    /// hard cap on any single length field, so a corrupt file cannot
    /// convince us to allocate unbounded memory
    const MAX_FIELD: u32 = 1 << 28;

    /// write atomically: everything goes to a sibling temp file that
    /// only replaces the previous snapshot once complete
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let temp = path.with_extension("pfstate.tmp");
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&temp)?);
        self.encode(&mut writer)?;
        writer.flush()?;
        drop(writer);
        std::fs::rename(&temp, path)?;
        Ok(())
    }

    /// load and validate. every failure here means the snapshot is
    /// unusable, and the caller warms up from cold instead.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let mut reader = std::io::BufReader::new(std::fs::File::open(path)?);
        Self::decode(&mut reader)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> anyhow::Result<()> {
        writer.write_all(Self::MAGIC)?;
        write_bytes(writer, self.game.as_bytes())?;
        writer.write_i32::<LE>(self.watermark)?;
        write_bytes(writer, &inputs_to_bytes(&self.movie))?;
        writer.write_u32::<LE>(self.subtitles.len() as u32)?;
        for subtitle in self.subtitles.iter() {
            write_bytes(writer, subtitle.as_bytes())?;
        }
        writer.write_u32::<LE>(self.memories.len() as u32)?;
        for memory in self.memories.iter() {
            write_bytes(writer, memory)?;
        }
        writer.write_i32::<LE>(self.checkpoint.movenum as i32)?;
        write_bytes(writer, self.checkpoint.savestate.bytes())?;
        writer.write_u32::<LE>(self.motifs.len() as u32)?;
        for (weight, inputs) in self.motifs.iter() {
            writer.write_f64::<LE>(*weight)?;
            write_bytes(writer, &inputs_to_bytes(inputs))?;
        }
        writer.write_u32::<LE>(self.nfutures)?;
        write_bytes(writer, &self.rng)?;
        Ok(())
    }

    fn decode<R: Read>(reader: &mut R) -> anyhow::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        anyhow::ensure!(&magic == Self::MAGIC, "unknown snapshot magic {:?}", magic);
        let game = String::from_utf8(read_bytes(reader)?)?;
        let watermark = reader.read_i32::<LE>()?;
        let movie = inputs_from_bytes(read_bytes(reader)?);
        let subtitles = (0..read_count(reader)?)
            .map(|_| read_bytes(reader).and_then(|b| Ok(String::from_utf8(b)?)))
            .collect::<Result<Vec<_>, _>>()?;
        let memories = (0..read_count(reader)?)
            .map(|_| read_bytes(reader))
            .collect::<Result<Vec<_>, _>>()?;
        let movenum = reader.read_i32::<LE>()?;
        anyhow::ensure!(movenum >= 0, "negative checkpoint movenum");
        let checkpoint = Checkpoint {
            movenum: movenum as usize,
            savestate: Savestate::from(read_bytes(reader)?),
        };
        let motifs = (0..read_count(reader)?)
            .map(|_| {
                let weight = reader.read_f64::<LE>()?;
                let inputs = inputs_from_bytes(read_bytes(reader)?);
                Ok((weight, inputs))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let nfutures = reader.read_u32::<LE>()?;
        let rng = read_bytes(reader)?;
        Ok(Self {
            game,
            watermark,
            movie,
            subtitles,
            memories,
            checkpoint,
            motifs,
            nfutures,
            rng,
        })
    }
}

fn read_count<R: Read>(reader: &mut R) -> anyhow::Result<u32> {
    let count = reader.read_u32::<LE>()?;
    anyhow::ensure!(count <= Snapshot::MAX_FIELD, "oversized count ({})", count);
    Ok(count)
}

fn read_bytes<R: Read>(reader: &mut R) -> anyhow::Result<Vec<u8>> {
    let length = read_count(reader)?;
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
