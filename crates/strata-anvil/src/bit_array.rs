use strata_common::error::StrataError;
use strata_common::types::Result;

/// Smallest width a section's block state indices are ever stored at.
pub const MIN_BITS_PER_BLOCK: u8 = 4;

const WORD_BITS: u32 = u64::BITS;

/// How values are laid out over the 64-bit words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackingPolicy {
    /// Values run on continuously and may straddle two words (1.13 - 1.15 block states).
    Tight,
    /// A value that would straddle two words starts at the next word instead, leaving the high
    /// `64 % bits` bits of every word unused (1.16+ block states).
    #[default]
    Aligned,
}

impl PackingPolicy {
    /// Words needed to hold `len` values of `bits` width.
    pub fn required_words(self, len: usize, bits: u8) -> usize {
        let bits = bits.max(1) as usize;
        match self {
            PackingPolicy::Tight => (len * bits).div_ceil(WORD_BITS as usize),
            PackingPolicy::Aligned => len.div_ceil(WORD_BITS as usize / bits),
        }
    }

    /// Works out which layout produced an array of `word_count` words. Aligned wins when both
    /// fit, which happens whenever `bits` divides 64 and the two layouts are identical.
    pub fn detect(len: usize, bits: u8, word_count: usize) -> Option<Self> {
        [PackingPolicy::Aligned, PackingPolicy::Tight]
            .into_iter()
            .find(|policy| policy.required_words(len, bits) == word_count)
    }

    /// Word index and bit offset of the value at `index`.
    fn position(self, index: usize, bits: u8) -> (usize, u32) {
        let bits = bits as usize;
        match self {
            PackingPolicy::Tight => {
                let bit = index * bits;
                (bit / WORD_BITS as usize, (bit % WORD_BITS as usize) as u32)
            }
            PackingPolicy::Aligned => {
                // Every skipped word also skips its padding
                let per_word = WORD_BITS as usize / bits;
                (index / per_word, ((index % per_word) * bits) as u32)
            }
        }
    }
}

/// Minimum width able to index a palette of `palette_size` entries, never below 4:
/// `max(4, ceil(log2(palette_size)))`.
pub fn bits_needed(palette_size: usize) -> u8 {
    let bits = usize::BITS - palette_size.saturating_sub(1).leading_zeros();
    bits.max(MIN_BITS_PER_BLOCK as u32) as u8
}

fn mask(bits: u8) -> u64 {
    if bits as u32 >= WORD_BITS {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn check_width(bits: u8) -> Result<()> {
    if (1..=64).contains(&bits) {
        Ok(())
    } else {
        Err(StrataError::InvalidWidth(bits))
    }
}

/// Fixed number of fixed-width unsigned values packed into 64-bit words, least significant
/// bits first.
/// The width never changes in place: [`BitPackedArray::repack`] builds a new array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitPackedArray {
    words: Vec<u64>,
    bits_per_value: u8,
    len: usize,
    policy: PackingPolicy,
}

impl BitPackedArray {
    /// All-zero array of `len` values.
    pub fn new(len: usize, bits_per_value: u8, policy: PackingPolicy) -> Result<Self> {
        check_width(bits_per_value)?;
        Ok(Self {
            words: vec![0; policy.required_words(len, bits_per_value)],
            bits_per_value,
            len,
            policy,
        })
    }

    /// Wraps existing storage, which must be large enough for `len` values.
    pub fn from_words(
        words: Vec<u64>,
        len: usize,
        bits_per_value: u8,
        policy: PackingPolicy,
    ) -> Result<Self> {
        check_width(bits_per_value)?;
        let required = policy.required_words(len, bits_per_value);
        if words.len() < required {
            return Err(StrataError::Corruption(format!(
                "{} words cannot hold {} values of {} bits, need {}",
                words.len(),
                len,
                bits_per_value,
                required
            )));
        }
        Ok(Self {
            words,
            bits_per_value,
            len,
            policy,
        })
    }

    /// Wraps storage whose width and size the caller has already validated.
    pub(crate) fn from_parts(
        words: Vec<u64>,
        len: usize,
        bits_per_value: u8,
        policy: PackingPolicy,
    ) -> Self {
        Self {
            words,
            bits_per_value,
            len,
            policy,
        }
    }

    pub fn from_values(values: &[u64], bits_per_value: u8, policy: PackingPolicy) -> Result<Self> {
        let mut array = Self::new(values.len(), bits_per_value, policy)?;
        for (index, &value) in values.iter().enumerate() {
            array.set(index, value)?;
        }
        Ok(array)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bits_per_value(&self) -> u8 {
        self.bits_per_value
    }

    pub fn policy(&self) -> PackingPolicy {
        self.policy
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u64> {
        self.words
    }

    /// Sequential cursor positioned at index 0.
    pub fn reader(&self) -> BitReader<'_> {
        BitReader {
            words: &self.words,
            bits: self.bits_per_value,
            policy: self.policy,
            word: 0,
            offset: 0,
            index: 0,
        }
    }

    pub fn get(&self, index: usize) -> Result<u64> {
        self.check_index(index)?;
        let mut reader = self.reader();
        reader.jump_to_index(index);
        reader.read()
    }

    /// Overwrites one value at the array's own width.
    pub fn set(&mut self, index: usize, value: u64) -> Result<()> {
        self.check_index(index)?;
        let bits = self.bits_per_value;
        let mask = mask(bits);
        if value > mask {
            return Err(StrataError::Overflow("value wider than bits per value"));
        }

        let (word, offset) = self.policy.position(index, bits);
        let spans = offset + bits as u32 > WORD_BITS;
        let last = if spans { word + 1 } else { word };
        if last >= self.words.len() {
            return Err(StrataError::Bounds {
                index: last as i64,
                len: self.words.len(),
            });
        }

        self.words[word] = (self.words[word] & !(mask << offset)) | (value << offset);
        if spans {
            let high_bits = offset + bits as u32 - WORD_BITS;
            let high_mask = (1u64 << high_bits) - 1;
            self.words[word + 1] =
                (self.words[word + 1] & !high_mask) | (value >> (WORD_BITS - offset));
        }
        Ok(())
    }

    /// Decodes every value in order.
    pub fn to_values(&self) -> Result<Vec<u64>> {
        let mut reader = self.reader();
        (0..self.len).map(|_| reader.read()).collect()
    }

    /// Rebuilds the array at another width: decode everything, allocate fresh storage sized
    /// for `bits_per_value`, encode everything again. Same policy as before.
    pub fn repack(&self, bits_per_value: u8) -> Result<Self> {
        let values = self.to_values()?;
        Self::from_values(&values, bits_per_value, self.policy)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(StrataError::Bounds {
                index: index as i64,
                len: self.len,
            })
        }
    }
}

/// Cursor over a [`BitPackedArray`].
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    words: &'a [u64],
    bits: u8,
    policy: PackingPolicy,
    word: usize,
    offset: u32,
    index: usize,
}

impl BitReader<'_> {
    /// Moves the cursor to logical value `index`.
    pub fn jump_to_index(&mut self, index: usize) {
        let (word, offset) = self.policy.position(index, self.bits);
        self.word = word;
        self.offset = offset;
        self.index = index;
    }

    /// Logical index of the next value `read` returns.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Extracts the next value and advances. Fails if the value would need a word past the
    /// end of the storage.
    pub fn read(&mut self) -> Result<u64> {
        let bits = self.bits as u32;
        if self.policy == PackingPolicy::Aligned && self.offset + bits > WORD_BITS {
            self.word += 1;
            self.offset = 0;
        }

        let spans = self.offset + bits > WORD_BITS;
        let last = if spans { self.word + 1 } else { self.word };
        if last >= self.words.len() {
            return Err(StrataError::Bounds {
                index: last as i64,
                len: self.words.len(),
            });
        }

        let mut value = self.words[self.word] >> self.offset;
        if spans {
            value |= self.words[self.word + 1] << (WORD_BITS - self.offset);
        }

        let end = self.offset + bits;
        self.word += (end / WORD_BITS) as usize;
        self.offset = end % WORD_BITS;
        self.index += 1;

        Ok(value & mask(self.bits))
    }
}
