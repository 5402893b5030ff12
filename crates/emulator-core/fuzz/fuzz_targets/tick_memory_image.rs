#![no_main]

use emulator_core::{Architecture, BufferPort, Machine};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&budget, image)) = data.split_first() else {
        return;
    };
    let Ok(arch) = Architecture::standard() else {
        return;
    };

    let mut machine = Machine::new(arch);
    let words: Vec<u16> = image.iter().take(256).map(|&byte| u16::from(byte)).collect();
    if machine.load_image(&words).is_err() {
        return;
    }
    machine.register_port(0, Box::new(BufferPort::with_input(words.iter().copied())));

    machine.run_until_halt(u64::from(budget) * 16);

    let word_size = machine.datapath().word_size();
    assert!(machine
        .datapath()
        .components()
        .all(|view| u32::from(view.value) < word_size));
    assert!(machine
        .datapath()
        .memory()
        .iter()
        .all(|&word| u32::from(word) < word_size));
});
