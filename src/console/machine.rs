use super::Emulator;
use super::Input;
use super::Memory;
use super::Savestate;
use byteorder::ByteOrder;
use byteorder::LE;
use std::hash::Hash;
use std::hash::Hasher;

/// small deterministic console standing in for a real emulator core.
/// it exists so the engine, the helper loop, and every test have a
/// cheap machine with honest semantics: a side-scrolling toy where
/// RIGHT makes progress, A occasionally scores, and hazards drain
/// health unless the player is holding UP.
///
/// RAM map:
///   0  x position
///   1  y position
///   2  scroll low      4  score
///   3  scroll high     5  health
///   6  frame counter   7  noise
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    ram: [u8; Self::RAM],
    clock: u64,
    noise: u64,
}

impl Machine {
    pub const RAM: usize = 32;

    const X: usize = 0;
    const Y: usize = 1;
    const SCROLL: usize = 2;
    const SCORE: usize = 4;
    const HEALTH: usize = 5;
    const CLOCK: usize = 6;
    const NOISE: usize = 7;

    pub fn new() -> Self {
        Self::boot("default")
    }

    /// derive the power-on state from the game name so distinct
    /// "cartridges" play out distinct runs
    pub fn boot(game: &str) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        game.hash(&mut hasher);
        let mut ram = [0u8; Self::RAM];
        ram[Self::X] = 0x20;
        ram[Self::Y] = 0xB0;
        ram[Self::HEALTH] = 3;
        Self {
            ram,
            clock: 0,
            noise: hasher.finish() | 1,
        }
    }

    fn scroll(&self) -> u16 {
        LE::read_u16(&self.ram[Self::SCROLL..Self::SCROLL + 2])
    }

    fn set_scroll(&mut self, scroll: u16) {
        LE::write_u16(&mut self.ram[Self::SCROLL..Self::SCROLL + 2], scroll)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Emulator for Machine {
    fn save(&self) -> Savestate {
        let mut bytes = Vec::with_capacity(Self::RAM + 16);
        bytes.extend_from_slice(&self.ram);
        bytes.extend_from_slice(&self.clock.to_le_bytes());
        bytes.extend_from_slice(&self.noise.to_le_bytes());
        Savestate::from(bytes)
    }

    fn load(&mut self, state: &Savestate) {
        let bytes = state.bytes();
        assert!(bytes.len() == Self::RAM + 16, "savestate from foreign machine");
        self.ram.copy_from_slice(&bytes[..Self::RAM]);
        self.clock = u64::from_le_bytes(bytes[Self::RAM..Self::RAM + 8].try_into().unwrap());
        self.noise = u64::from_le_bytes(bytes[Self::RAM + 8..].try_into().unwrap());
    }

    fn step(&mut self, input: Input) -> Memory {
        self.clock = self.clock.wrapping_add(1);
        self.noise = self
            .noise
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        if input.holds(Input::RIGHT) {
            match self.ram[Self::X] {
                x if x < 0xC0 => self.ram[Self::X] = x + 1,
                _ => self.set_scroll(self.scroll().wrapping_add(1)),
            }
        }
        if input.holds(Input::LEFT) {
            self.ram[Self::X] = self.ram[Self::X].saturating_sub(1);
        }
        if input.holds(Input::UP) {
            self.ram[Self::Y] = self.ram[Self::Y].saturating_sub(2);
        } else if self.ram[Self::Y] < 0xB0 {
            self.ram[Self::Y] += 1;
        }
        if input.holds(Input::A) && self.noise >> 33 & 0x7 == 0 {
            self.ram[Self::SCORE] = self.ram[Self::SCORE].wrapping_add(1);
        }
        if self.noise >> 40 & 0x3F == 0 && !input.holds(Input::UP) {
            self.ram[Self::HEALTH] = self.ram[Self::HEALTH].saturating_sub(1);
        }
        self.ram[Self::CLOCK] = self.clock as u8;
        self.ram[Self::NOISE] = (self.noise >> 56) as u8;
        self.memory()
    }

    fn memory(&self) -> Memory {
        self.ram.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_deterministic() {
        let mut a = Machine::boot("determinism");
        let mut b = Machine::boot("determinism");
        for byte in [0x80, 0x81, 0x00, 0x10, 0xFF, 0x80, 0x01] {
            assert_eq!(a.step(Input(byte)), b.step(Input(byte)));
        }
    }

    #[test]
    fn savestate_roundtrip_is_behaviorally_identity() {
        let mut a = Machine::boot("roundtrip");
        for _ in 0..100 {
            a.step(Input::RIGHT);
        }
        let state = a.save();
        let mut b = Machine::new();
        b.load(&state);
        for _ in 0..100 {
            assert_eq!(a.step(Input::A), b.step(Input::A));
        }
    }

    #[test]
    fn holding_right_makes_progress() {
        let mut machine = Machine::new();
        let before = machine.memory();
        for _ in 0..64 {
            machine.step(Input::RIGHT);
        }
        let after = machine.memory();
        assert!(after[Machine::X] > before[Machine::X]);
    }
}
