use crate::Magnitude;
use crate::console::Emulator;
use crate::console::Input;
use crate::console::Memory;
use crate::console::Savestate;
use crate::objective::Objectives;

/// integrate objective magnitudes along an input sequence from a
/// given state: load, walk, and accumulate the per-step magnitude
/// between consecutive memories. returns the running sum and the
/// terminal memory. pure given (start, inputs).
pub fn integrate<E: Emulator>(
    emulator: &mut E,
    start: &Savestate,
    inputs: &[Input],
    objectives: &Objectives,
) -> (Magnitude, Memory) {
    emulator.load(start);
    let mut prev = emulator.memory();
    let mut sum = 0.;
    for &input in inputs {
        let next = emulator.step(input);
        sum += objectives.evaluate(&prev, &next);
        prev = next;
    }
    (sum, prev)
}
