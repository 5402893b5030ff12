//! Symbol table and the two resolution passes.
//!
//! The node sequence is the code region followed by every data region in
//! declaration order. Node `i` lands at address `i + 1`; address 0 is
//! reserved.

use std::collections::{BTreeMap, HashMap};

use emulator_core::{BufferInfo, DebugDatabase, Word};

use crate::errors::{AssembleError, AssembleErrorKind};
use crate::parser::{NodeValue, ParsedProgram, Symbol};

/// Addresses of every declared symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    addresses: HashMap<Symbol, usize>,
    declared: Vec<Symbol>,
    regions: Vec<(Symbol, usize, usize)>,
    code_end: usize,
    len: usize,
}

impl SymbolTable {
    /// Pass 1: assigns addresses. The first declaration of a label wins.
    #[must_use]
    pub fn assign(program: &ParsedProgram) -> Self {
        let mut table = Self {
            code_end: program.code.len() + 1,
            ..Self::default()
        };

        for (index, node) in program.code.iter().enumerate() {
            if let Some(label) = &node.label {
                table.declare(label, index + 1);
            }
        }

        let mut address = table.code_end;
        for region in &program.data {
            table.declare(&region.symbol, address);
            table
                .regions
                .push((region.symbol.clone(), address, region.words.len()));
            address += region.words.len();
        }
        table.len = address;
        table
    }

    fn declare(&mut self, symbol: &Symbol, address: usize) {
        if self.addresses.contains_key(symbol) {
            log::debug!("ignoring redeclaration of {symbol} at {address}");
            return;
        }
        self.addresses.insert(symbol.clone(), address);
        self.declared.push(symbol.clone());
    }

    /// Address of `symbol`.
    #[must_use]
    pub fn address(&self, symbol: &Symbol) -> Option<usize> {
        self.addresses.get(symbol).copied()
    }

    /// Address of the first data word.
    #[must_use]
    pub const fn code_end(&self) -> usize {
        self.code_end
    }

    /// Image length in words, including the reserved word 0.
    #[must_use]
    pub const fn image_len(&self) -> usize {
        self.len
    }

    /// Pass 2: builds the image with every reference replaced by its
    /// address.
    ///
    /// # Errors
    ///
    /// Fails on the first reference to an undeclared label, or on a label
    /// address that is not below `word_size`.
    pub fn resolve(
        &self,
        program: &ParsedProgram,
        word_size: u32,
    ) -> Result<Vec<Word>, AssembleError> {
        let mut image = Vec::with_capacity(self.len);
        image.push(0);

        for node in &program.code {
            let word = match &node.value {
                NodeValue::Word(word) => *word,
                NodeValue::Ref(symbol) => {
                    let address = self.address(symbol).ok_or_else(|| {
                        AssembleError::at(
                            AssembleErrorKind::UndefinedLabel(symbol.to_string()),
                            node.pos,
                        )
                    })?;
                    to_word(symbol, address, word_size)
                        .map_err(|kind| AssembleError::at(kind, node.pos))?
                }
            };
            image.push(word);
        }

        for region in &program.data {
            image.extend_from_slice(&region.words);
        }
        Ok(image)
    }

    /// Debug information: labeled addresses, data regions and `code_end`.
    ///
    /// Labels only need to fit in memory, not in a word; a label past the
    /// last addressable cell (an empty buffer at the very end) is left out.
    #[must_use]
    pub fn debug_database(&self) -> DebugDatabase {
        let mut points = BTreeMap::new();
        for symbol in &self.declared {
            if let Some(address) = self.address(symbol).and_then(memory_address) {
                points.entry(address).or_insert_with(|| symbol.to_string());
            }
        }

        let mut values = BTreeMap::new();
        for (symbol, start, size) in &self.regions {
            let Some(start) = memory_address(*start) else {
                continue;
            };
            values.insert(
                start,
                BufferInfo {
                    name: symbol.to_string(),
                    size: *size,
                },
            );
        }

        let code_end = Word::try_from(self.code_end).unwrap_or(Word::MAX);
        DebugDatabase {
            points,
            values,
            code_end,
        }
    }
}

fn memory_address(address: usize) -> Option<Word> {
    let word = Word::try_from(address).ok();
    if word.is_none() {
        log::debug!("label at {address} is outside the address space");
    }
    word
}

fn to_word(symbol: &Symbol, address: usize, word_size: u32) -> Result<Word, AssembleErrorKind> {
    Word::try_from(address)
        .ok()
        .filter(|&word| u32::from(word) < word_size)
        .ok_or_else(|| AssembleErrorKind::AddressOverflow {
            label: symbol.to_string(),
            address,
        })
}

#[cfg(test)]
mod tests {
    use emulator_core::IsaRegistry;

    use super::SymbolTable;
    use crate::errors::{AssembleErrorKind, SourcePos};
    use crate::lexer::tokenize;
    use crate::parser::{parse, ParsedProgram, Symbol};

    fn parsed(source: &str) -> ParsedProgram {
        let isa = IsaRegistry::standard().unwrap();
        parse(&tokenize(source), &isa, 256, false).unwrap()
    }

    fn user(name: &str) -> Symbol {
        Symbol::User(name.to_string())
    }

    #[test]
    fn labels_address_their_node_plus_one() {
        let program = parsed("nop ::loop jmp :loop");
        let table = SymbolTable::assign(&program);

        assert_eq!(table.address(&user("loop")), Some(2));
        assert_eq!(table.resolve(&program, 256).unwrap(), [0, 0, 1, 2]);
    }

    #[test]
    fn first_declaration_wins() {
        let program = parsed("::x nop ::x hlt jmp :x");
        let table = SymbolTable::assign(&program);

        assert_eq!(table.address(&user("x")), Some(1));
    }

    #[test]
    fn data_follows_code_in_declaration_order() {
        let program = parsed("loa \"hi\" loa $buf[2] loa \"\"");
        let table = SymbolTable::assign(&program);

        assert_eq!(table.code_end(), 7);
        assert_eq!(table.address(&Symbol::Str(0)), Some(7));
        assert_eq!(table.address(&Symbol::Buffer("buf".to_string())), Some(10));
        assert_eq!(table.address(&Symbol::Str(1)), Some(12));
        assert_eq!(table.image_len(), 13);

        let image = table.resolve(&program, 256).unwrap();
        assert_eq!(&image[7..], [104, 105, 0, 0, 0, 0]);
    }

    #[test]
    fn undefined_label_reports_the_reference() {
        let program = parsed("nop\njmp :nowhere");
        let error = SymbolTable::assign(&program)
            .resolve(&program, 256)
            .unwrap_err();

        assert_eq!(
            error.kind,
            AssembleErrorKind::UndefinedLabel(":nowhere".to_string())
        );
        assert_eq!(error.position, Some(SourcePos::new(2, 5)));
    }

    #[test]
    fn addresses_must_fit_in_a_word() {
        let source = format!("{} ::end hlt jmp :end", "nop ".repeat(20));
        let program = parsed(&source);
        let error = SymbolTable::assign(&program)
            .resolve(&program, 16)
            .unwrap_err();

        assert_eq!(
            error.kind,
            AssembleErrorKind::AddressOverflow {
                label: ":end".to_string(),
                address: 21,
            }
        );
    }

    #[test]
    fn unreferenced_labels_may_lie_beyond_the_word() {
        let source = format!("{} ::tail hlt", "nop ".repeat(300));
        let program = parsed(&source);
        let table = SymbolTable::assign(&program);

        assert!(table.resolve(&program, 256).is_ok());
        assert_eq!(table.debug_database().address_of(":tail"), Some(301));
    }

    #[test]
    fn debug_database_keeps_the_first_label_per_address() {
        let program = parsed("::a ::b nop \"x\" $zero[0] ::c hlt");
        let debug = SymbolTable::assign(&program).debug_database();

        assert_eq!(debug.label_at(1), Some(":b"));
        assert_eq!(debug.label_at(4), Some(":c"));
        assert_eq!(debug.code_end, 5);
        assert_eq!(debug.label_at(5), Some("s0"));
        assert_eq!(debug.values[&5].size, 2);
        assert_eq!(debug.values[&7].size, 0);
    }
}
