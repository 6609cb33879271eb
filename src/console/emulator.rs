use super::Input;
use super::Memory;

/// opaque emulator-produced state blob. the only guarantee is the
/// round trip: load(save(s)) yields a behaviorally identical machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Savestate(Vec<u8>);

impl Savestate {
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}
impl From<Vec<u8>> for Savestate {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
impl From<Savestate> for Vec<u8> {
    fn from(state: Savestate) -> Self {
        state.0
    }
}

/// contract consumed from the emulator collaborator.
///
/// step is deterministic given (state, input) and must not fail; that
/// determinism is what the whole search rests on. instances are not
/// thread safe, so every concurrent worker clones one and loads its
/// own copy of the round state rather than sharing.
pub trait Emulator: Clone + Send {
    fn save(&self) -> Savestate;
    fn load(&mut self, state: &Savestate);
    fn step(&mut self, input: Input) -> Memory;
    fn memory(&self) -> Memory;
}
