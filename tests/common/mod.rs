//! Test-only JPEG writer producing small baseline and progressive files with
//! known quantized coefficients.

#![allow(dead_code)]

use std::io::Write;

use jpegcoef_rs::Block;
use jpegcoef_rs::constants::NATURAL_ORDER;
use jpegcoef_rs::jpeg1::huffman::{
    STD_LUMINANCE_AC_LENGTHS, STD_LUMINANCE_AC_VALUES, STD_LUMINANCE_DC_LENGTHS,
    STD_LUMINANCE_DC_VALUES,
};
use tempfile::NamedTempFile;

/// Code and length for every symbol of a canonical Huffman table.
struct HuffmanCodes {
    codes: [(u16, u8); 256],
}

impl HuffmanCodes {
    fn new(lengths: &[u8; 16], values: &[u8]) -> Self {
        let mut codes = [(0u16, 0u8); 256];
        let mut code = 0u16;
        let mut index = 0;
        for (i, &count) in lengths.iter().enumerate() {
            for _ in 0..count {
                codes[values[index] as usize] = (code, (i + 1) as u8);
                code += 1;
                index += 1;
            }
            code <<= 1;
        }
        Self { codes }
    }
}

/// MSB-first bit packer with FF00 stuffing.
struct BitWriter {
    out: Vec<u8>,
    bit_buffer: u32,
    bits_in_buffer: u32,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            bit_buffer: 0,
            bits_in_buffer: 0,
        }
    }

    fn write_bits(&mut self, value: u32, length: u32) {
        if length == 0 {
            return;
        }
        let mask = (1u32 << length) - 1;
        self.bit_buffer = (self.bit_buffer << length) | (value & mask);
        self.bits_in_buffer += length;
        while self.bits_in_buffer >= 8 {
            let shift = self.bits_in_buffer - 8;
            let byte = ((self.bit_buffer >> shift) & 0xFF) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
            self.bits_in_buffer = shift;
            self.bit_buffer &= (1u32 << shift) - 1;
        }
    }

    fn write_symbol(&mut self, table: &HuffmanCodes, symbol: u8) {
        let (code, length) = table.codes[symbol as usize];
        assert!(length > 0, "symbol {symbol:#x} missing from table");
        self.write_bits(code as u32, length as u32);
    }

    /// Pads the last byte with ones.
    fn flush(&mut self) {
        if self.bits_in_buffer > 0 {
            let pad = 8 - self.bits_in_buffer;
            self.write_bits((1 << pad) - 1, pad);
        }
    }

    fn restart_marker(&mut self, index: u8) {
        self.flush();
        self.out.extend_from_slice(&[0xFF, 0xD0 + (index & 7)]);
    }

    fn into_bytes(mut self) -> Vec<u8> {
        self.flush();
        self.out
    }
}

/// Magnitude category and the appended bits for `value`.
fn magnitude(value: i32) -> (u8, u32) {
    if value == 0 {
        return (0, 0);
    }
    let size = 32 - value.unsigned_abs().leading_zeros();
    let bits = if value < 0 { value + (1 << size) - 1 } else { value };
    (size as u8, bits as u32)
}

/// Point transform of the AC first scans: magnitude shift, sign kept.
fn point_transform(value: i16, al: u8) -> i32 {
    let magnitude = (value.unsigned_abs() >> al) as i32;
    if value < 0 { -magnitude } else { magnitude }
}

#[derive(Debug, Clone, Copy)]
enum ScanKind {
    Sequential,
    DcFirst { al: u8 },
    DcRefine { al: u8 },
    AcFirst { ss: u8, se: u8, al: u8 },
    AcRefine { ss: u8, se: u8, al: u8 },
}

impl ScanKind {
    fn parameters(self) -> (u8, u8, u8, u8) {
        match self {
            ScanKind::Sequential => (0, 63, 0, 0),
            ScanKind::DcFirst { al } => (0, 0, 0, al),
            ScanKind::DcRefine { al } => (0, 0, al + 1, al),
            ScanKind::AcFirst { ss, se, al } => (ss, se, 0, al),
            ScanKind::AcRefine { ss, se, al } => (ss, se, al + 1, al),
        }
    }
}

type CoefficientFn = dyn Fn(usize, usize, usize) -> Block;

pub struct JpegBuilder {
    width: u16,
    height: u16,
    components: Vec<(u8, u8)>,
    jfif: bool,
    segments: Vec<(u8, Vec<u8>)>,
    restart_interval: u16,
    progressive: bool,
    sequential_scan: Option<Vec<usize>>,
    dc_symbols: Option<Vec<u8>>,
    coefficients: Box<CoefficientFn>,
    trailing: Vec<u8>,
}

impl JpegBuilder {
    /// A JFIF YCbCr image with three 1x1-sampled components and
    /// [`sample_block`] coefficients.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            components: vec![(1, 0x11), (2, 0x11), (3, 0x11)],
            jfif: true,
            segments: Vec::new(),
            restart_interval: 0,
            progressive: false,
            sequential_scan: None,
            dc_symbols: None,
            coefficients: Box::new(sample_block),
            trailing: Vec::new(),
        }
    }

    /// `(id, sampling)` pairs, sampling as `h << 4 | v`.
    pub fn components(mut self, components: &[(u8, u8)]) -> Self {
        self.components = components.to_vec();
        self
    }

    pub fn without_jfif(mut self) -> Self {
        self.jfif = false;
        self
    }

    pub fn comment(mut self, payload: &[u8]) -> Self {
        self.segments.push((0xFE, payload.to_vec()));
        self
    }

    pub fn app(mut self, n: u8, payload: &[u8]) -> Self {
        self.segments.push((0xE0 + n, payload.to_vec()));
        self
    }

    pub fn restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    pub fn progressive(mut self) -> Self {
        self.progressive = true;
        self
    }

    /// Limits the single sequential scan to the given component indices.
    pub fn sequential_scan(mut self, components: &[usize]) -> Self {
        self.sequential_scan = Some(components.to_vec());
        self
    }

    /// Replaces the symbols of the DC table while keeping its code lengths.
    pub fn dc_symbols(mut self, symbols: &[u8]) -> Self {
        self.dc_symbols = Some(symbols.to_vec());
        self
    }

    pub fn coefficients(mut self, f: impl Fn(usize, usize, usize) -> Block + 'static) -> Self {
        self.coefficients = Box::new(f);
        self
    }

    /// Bytes appended after the EOI marker.
    pub fn trailing(mut self, bytes: &[u8]) -> Self {
        self.trailing = bytes.to_vec();
        self
    }

    fn max_sampling(&self) -> (usize, usize) {
        let h = self.components.iter().map(|&(_, s)| (s >> 4) as usize).max().unwrap_or(1);
        let v = self.components.iter().map(|&(_, s)| (s & 0x0F) as usize).max().unwrap_or(1);
        (h, v)
    }

    /// Visible block grid of component `index`.
    pub fn block_grid(&self, index: usize) -> (usize, usize) {
        let (max_h, max_v) = self.max_sampling();
        let sampling = self.components[index].1;
        let h = (sampling >> 4) as usize;
        let v = (sampling & 0x0F) as usize;
        (
            (self.width as usize * h).div_ceil(8 * max_h),
            (self.height as usize * v).div_ceil(8 * max_v),
        )
    }

    pub fn block(&self, component: usize, row: usize, col: usize) -> Block {
        (self.coefficients)(component, row, col)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0xFF, 0xD8];
        if self.jfif {
            push_segment(&mut out, 0xE0, b"JFIF\0\x01\x02\x00\x00\x01\x00\x01\x00\x00");
        }
        for (marker, payload) in &self.segments {
            push_segment(&mut out, *marker, payload);
        }

        let mut dqt = vec![0x00];
        dqt.extend_from_slice(&[1u8; 64]);
        push_segment(&mut out, 0xDB, &dqt);

        let mut sof = Vec::new();
        sof.push(8);
        sof.extend_from_slice(&self.height.to_be_bytes());
        sof.extend_from_slice(&self.width.to_be_bytes());
        sof.push(self.components.len() as u8);
        for &(id, sampling) in &self.components {
            sof.extend_from_slice(&[id, sampling, 0]);
        }
        push_segment(&mut out, if self.progressive { 0xC2 } else { 0xC0 }, &sof);

        let mut dht = vec![0x00];
        dht.extend_from_slice(&STD_LUMINANCE_DC_LENGTHS);
        match &self.dc_symbols {
            Some(symbols) => dht.extend_from_slice(symbols),
            None => dht.extend_from_slice(&STD_LUMINANCE_DC_VALUES),
        }
        dht.push(0x10);
        dht.extend_from_slice(&STD_LUMINANCE_AC_LENGTHS);
        dht.extend_from_slice(&STD_LUMINANCE_AC_VALUES);
        push_segment(&mut out, 0xC4, &dht);

        if self.restart_interval != 0 {
            push_segment(&mut out, 0xDD, &self.restart_interval.to_be_bytes());
        }

        let all: Vec<usize> = (0..self.components.len()).collect();
        if self.progressive {
            self.push_scan(&mut out, &all, ScanKind::DcFirst { al: 1 });
            for i in 0..self.components.len() {
                self.push_scan(&mut out, &[i], ScanKind::AcFirst { ss: 1, se: 5, al: 1 });
                self.push_scan(&mut out, &[i], ScanKind::AcFirst { ss: 6, se: 63, al: 1 });
            }
            self.push_scan(&mut out, &all, ScanKind::DcRefine { al: 0 });
            for i in 0..self.components.len() {
                self.push_scan(&mut out, &[i], ScanKind::AcRefine { ss: 1, se: 63, al: 0 });
            }
        } else {
            let scanned = self.sequential_scan.as_deref().unwrap_or(&all);
            self.push_scan(&mut out, scanned, ScanKind::Sequential);
        }

        out.extend_from_slice(&[0xFF, 0xD9]);
        out.extend_from_slice(&self.trailing);
        out
    }

    /// Writes the file to a temporary path.
    pub fn write_temp(&self) -> NamedTempFile {
        write_temp(&self.build())
    }

    fn push_scan(&self, out: &mut Vec<u8>, components: &[usize], kind: ScanKind) {
        let (ss, se, ah, al) = kind.parameters();
        let mut header = vec![components.len() as u8];
        for &index in components {
            header.extend_from_slice(&[self.components[index].0, 0x00]);
        }
        header.extend_from_slice(&[ss, se, (ah << 4) | al]);
        push_segment(out, 0xDA, &header);
        out.extend(self.encode_scan(components, kind));
    }

    /// Blocks of a scan, grouped by MCU.
    fn mcus(&self, components: &[usize]) -> Vec<Vec<(usize, usize, usize)>> {
        let mut mcus = Vec::new();
        if components.len() == 1 {
            let index = components[0];
            let (width, height) = self.block_grid(index);
            for row in 0..height {
                for col in 0..width {
                    mcus.push(vec![(index, row, col)]);
                }
            }
            return mcus;
        }

        let (max_h, max_v) = self.max_sampling();
        let mcus_per_row = (self.width as usize).div_ceil(8 * max_h);
        let mcu_rows = (self.height as usize).div_ceil(8 * max_v);
        for mcu_row in 0..mcu_rows {
            for mcu_col in 0..mcus_per_row {
                let mut blocks = Vec::new();
                for &index in components {
                    let sampling = self.components[index].1;
                    let h = (sampling >> 4) as usize;
                    let v = (sampling & 0x0F) as usize;
                    for y in 0..v {
                        for x in 0..h {
                            blocks.push((index, mcu_row * v + y, mcu_col * h + x));
                        }
                    }
                }
                mcus.push(blocks);
            }
        }
        mcus
    }

    fn encode_scan(&self, components: &[usize], kind: ScanKind) -> Vec<u8> {
        let dc = HuffmanCodes::new(&STD_LUMINANCE_DC_LENGTHS, &STD_LUMINANCE_DC_VALUES);
        let ac = HuffmanCodes::new(&STD_LUMINANCE_AC_LENGTHS, &STD_LUMINANCE_AC_VALUES);
        let mut writer = BitWriter::new();
        let mut predictors = vec![0i32; self.components.len()];
        let mut restart_index = 0u8;

        for (n, mcu) in self.mcus(components).into_iter().enumerate() {
            if self.restart_interval != 0 && n != 0 && n % self.restart_interval as usize == 0 {
                writer.restart_marker(restart_index);
                restart_index = restart_index.wrapping_add(1);
                predictors.iter_mut().for_each(|p| *p = 0);
            }
            for (index, row, col) in mcu {
                let block = self.block(index, row, col);
                match kind {
                    ScanKind::Sequential => {
                        encode_dc(&mut writer, &dc, &mut predictors[index], block[0] as i32);
                        encode_ac_first(&mut writer, &ac, &block, 1, 63, 0);
                    }
                    ScanKind::DcFirst { al } => {
                        encode_dc(&mut writer, &dc, &mut predictors[index], (block[0] as i32) >> al);
                    }
                    ScanKind::DcRefine { al } => {
                        writer.write_bits(((block[0] as i32) >> al) as u32 & 1, 1);
                    }
                    ScanKind::AcFirst { ss, se, al } => {
                        encode_ac_first(&mut writer, &ac, &block, ss as usize, se as usize, al);
                    }
                    ScanKind::AcRefine { ss, se, al } => {
                        encode_ac_refine(&mut writer, &ac, &block, ss as usize, se as usize, al);
                    }
                }
            }
        }
        writer.into_bytes()
    }
}

fn encode_dc(writer: &mut BitWriter, table: &HuffmanCodes, predictor: &mut i32, value: i32) {
    let (size, bits) = magnitude(value - *predictor);
    *predictor = value;
    writer.write_symbol(table, size);
    writer.write_bits(bits, size as u32);
}

/// Run/size coding of one block; each block ends with its own EOB.
fn encode_ac_first(writer: &mut BitWriter, table: &HuffmanCodes, block: &Block, ss: usize, se: usize, al: u8) {
    let mut run = 0u8;
    for k in ss..=se {
        let value = point_transform(block[NATURAL_ORDER[k]], al);
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            writer.write_symbol(table, 0xF0);
            run -= 16;
        }
        let (size, bits) = magnitude(value);
        writer.write_symbol(table, (run << 4) | size);
        writer.write_bits(bits, size as u32);
        run = 0;
    }
    if run > 0 {
        writer.write_symbol(table, 0x00);
    }
}

/// Successive approximation refinement of one block (G.1.2.3).
fn encode_ac_refine(writer: &mut BitWriter, table: &HuffmanCodes, block: &Block, ss: usize, se: usize, al: u8) {
    let absolute: Vec<u16> = (ss..=se)
        .map(|k| block[NATURAL_ORDER[k]].unsigned_abs() >> al)
        .collect();
    let last_new = absolute.iter().rposition(|&a| a == 1);

    let mut run = 0u8;
    let mut corrections: Vec<u32> = Vec::new();
    for (i, &value) in absolute.iter().enumerate() {
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 && last_new.is_some_and(|last| i <= last) {
            writer.write_symbol(table, 0xF0);
            run -= 16;
            for bit in corrections.drain(..) {
                writer.write_bits(bit, 1);
            }
        }
        if value > 1 {
            corrections.push((value & 1) as u32);
            continue;
        }
        writer.write_symbol(table, (run << 4) | 1);
        let negative = block[NATURAL_ORDER[ss + i]] < 0;
        writer.write_bits(if negative { 0 } else { 1 }, 1);
        for bit in corrections.drain(..) {
            writer.write_bits(bit, 1);
        }
        run = 0;
    }
    if run > 0 || !corrections.is_empty() {
        writer.write_symbol(table, 0x00);
        for bit in corrections.drain(..) {
            writer.write_bits(bit, 1);
        }
    }
}

fn push_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    out.extend_from_slice(&[0xFF, marker]);
    out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Deterministic coefficients with varied DC values, short and long zero
/// runs, and values needing several magnitude bits.
pub fn sample_block(component: usize, row: usize, col: usize) -> Block {
    let (c, r, x) = (component as i16, row as i16, col as i16);
    let mut block = [0i16; 64];
    block[0] = (c + 1) * 37 + r * 11 - x * 7 - 40;
    block[1] = (r - x) % 5;
    block[8] = (r + x) % 3 - 1;
    block[9] = -3 * c;
    block[27] = if (r + x) % 2 == 0 { 17 } else { -9 };
    block[63] = if (r + x + c) % 4 == 0 { -2 } else { 0 };
    block
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}
