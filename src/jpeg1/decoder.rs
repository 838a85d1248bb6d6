//! JPEG 1 coefficient decoder: entropy decodes scans into whole-image
//! coefficient planes without dequantization or IDCT.

use crate::constants::{DCT_SIZE, DCT_SIZE2, NATURAL_ORDER};
use crate::error::JpegError;
use crate::jpeg_marker_code::{JPEG_RESTART_MARKER_BASE, JPEG_RESTART_MARKER_RANGE, JpegMarkerCode};
use crate::jpeg_stream_reader::{JpegStreamReader, ScanInfo};
use crate::jpeg1::coefficient_plane::{Block, CoefficientPlane};
use crate::jpeg1::huffman::{HuffmanTable, JpegBitReader, extend};
use crate::message::MessageCode;
use crate::CodingProcess;

/// Tables one scan component decodes with.
struct ScanComponent {
    index: usize,
    h_samp_factor: usize,
    v_samp_factor: usize,
    dc_table: Option<HuffmanTable>,
    ac_table: Option<HuffmanTable>,
}

pub struct CoefficientDecoder {
    planes: Vec<CoefficientPlane>,
    scanned: Vec<bool>,
    // Successive approximation bit last seen per coefficient; -1 = never.
    coef_bits: Vec<[i8; DCT_SIZE2]>,
    progressive: bool,
    mcus_per_row: usize,
    mcu_rows: usize,
    bit_reader: JpegBitReader,
    dc_predictors: Vec<i32>,
    eobrun: u32,
    restarts_to_go: u32,
    next_restart_num: u8,
}

impl CoefficientDecoder {
    /// Allocates zeroed planes for every frame component, padded to whole MCUs.
    pub fn new(stream: &JpegStreamReader) -> Result<Self, JpegError> {
        let frame_info = stream.frame_info().ok_or(JpegError::NoScan)?;
        let max_h = stream.max_h_samp_factor() as usize;
        let max_v = stream.max_v_samp_factor() as usize;
        let mcus_per_row = (frame_info.width as usize).div_ceil(max_h * DCT_SIZE);
        let mcu_rows = (frame_info.height as usize).div_ceil(max_v * DCT_SIZE);

        let mut planes = Vec::with_capacity(stream.components.len());
        for component in &stream.components {
            planes.push(CoefficientPlane::new(
                component.width_in_blocks,
                component.height_in_blocks,
                mcus_per_row * component.h_samp_factor as usize,
                mcu_rows * component.v_samp_factor as usize,
            )?);
        }

        let count = stream.components.len();
        Ok(Self {
            planes,
            scanned: vec![false; count],
            coef_bits: vec![[-1; DCT_SIZE2]; count],
            progressive: frame_info.process == CodingProcess::Progressive,
            mcus_per_row,
            mcu_rows,
            bit_reader: JpegBitReader::new(),
            dc_predictors: vec![0; count],
            eobrun: 0,
            restarts_to_go: 0,
            next_restart_num: 0,
        })
    }

    pub fn planes(&self) -> &[CoefficientPlane] {
        &self.planes
    }

    /// True when every frame component has been covered by at least one scan.
    pub fn all_components_scanned(&self) -> bool {
        self.scanned.iter().all(|&s| s)
    }

    /// Decodes the scan whose header the stream reader has just parsed. On
    /// return the source sits at (or the stream reader holds) the marker
    /// following the entropy-coded data.
    pub fn decode_scan(&mut self, stream: &mut JpegStreamReader) -> Result<(), JpegError> {
        let scan = stream.scan().clone();
        let components = self.start_pass(stream, &scan)?;
        let restart_interval = stream.restart_interval as u32;

        if components.len() == 1 {
            let index = components[0].index;
            let width = self.planes[index].width_in_blocks();
            let height = self.planes[index].height_in_blocks();
            for row in 0..height {
                for col in 0..width {
                    if !self.begin_mcu(stream, restart_interval)? {
                        continue;
                    }
                    self.decode_block(stream, &scan, &components[0], row, col)?;
                }
            }
        } else {
            for mcu_row in 0..self.mcu_rows {
                for mcu_col in 0..self.mcus_per_row {
                    if !self.begin_mcu(stream, restart_interval)? {
                        continue;
                    }
                    for component in &components {
                        for v in 0..component.v_samp_factor {
                            for h in 0..component.h_samp_factor {
                                let row = mcu_row * component.v_samp_factor + v;
                                let col = mcu_col * component.h_samp_factor + h;
                                self.decode_block(stream, &scan, component, row, col)?;
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            components = ?scan.component_indices,
            ss = scan.ss,
            se = scan.se,
            ah = scan.ah,
            al = scan.al,
            "scan decoded"
        );
        self.bit_reader.reset();
        Ok(())
    }

    /// Resets per-scan state, checks the progression and resolves tables.
    fn start_pass(
        &mut self,
        stream: &mut JpegStreamReader,
        scan: &ScanInfo,
    ) -> Result<Vec<ScanComponent>, JpegError> {
        self.bit_reader.reset();
        self.eobrun = 0;
        self.restarts_to_go = stream.restart_interval as u32;
        self.next_restart_num = 0;
        for &index in &scan.component_indices {
            self.dc_predictors[index] = 0;
        }

        if self.progressive {
            self.update_progression(stream, scan)?;
        }

        let is_dc_scan = scan.ss == 0;
        let needs_dc = !self.progressive || (is_dc_scan && scan.ah == 0);
        let needs_ac = !self.progressive || !is_dc_scan;

        let mut components = Vec::with_capacity(scan.component_indices.len());
        for &index in &scan.component_indices {
            let component = &stream.components[index];
            let dc_table = if needs_dc {
                let dest = component.dc_table_dest;
                Some(
                    stream.huffman_tables_dc[dest as usize]
                        .clone()
                        .ok_or(JpegError::NoHuffmanTable(dest))?,
                )
            } else {
                None
            };
            let ac_table = if needs_ac {
                let dest = component.ac_table_dest;
                Some(
                    stream.huffman_tables_ac[dest as usize]
                        .clone()
                        .ok_or(JpegError::NoHuffmanTable(0x10 | dest))?,
                )
            } else {
                None
            };
            components.push(ScanComponent {
                index,
                h_samp_factor: component.h_samp_factor as usize,
                v_samp_factor: component.v_samp_factor as usize,
                dc_table,
                ac_table,
            });
            self.scanned[index] = true;
        }
        Ok(components)
    }

    /// Tracks the successive approximation state per coefficient and warns
    /// about scans that do not continue it.
    fn update_progression(
        &mut self,
        stream: &mut JpegStreamReader,
        scan: &ScanInfo,
    ) -> Result<(), JpegError> {
        for &index in &scan.component_indices {
            if scan.ss != 0 && self.coef_bits[index][0] < 0 {
                stream.emit(MessageCode::WarnBogusProgression {
                    component: index,
                    coefficient: 0,
                })?;
            }
            for k in scan.ss..=scan.se {
                let bits = &mut self.coef_bits[index][k as usize];
                let expected = (*bits).max(0) as u8;
                *bits = scan.al as i8;
                if scan.ah != expected {
                    stream.emit(MessageCode::WarnBogusProgression {
                        component: index,
                        coefficient: k,
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Handles a pending restart and reports whether the MCU should be decoded.
    fn begin_mcu(
        &mut self,
        stream: &mut JpegStreamReader,
        restart_interval: u32,
    ) -> Result<bool, JpegError> {
        if restart_interval != 0 {
            if self.restarts_to_go == 0 {
                self.process_restart(stream, restart_interval)?;
            }
            self.restarts_to_go -= 1;
        }
        Ok(!self.bit_reader.insufficient_data())
    }

    fn process_restart(
        &mut self,
        stream: &mut JpegStreamReader,
        restart_interval: u32,
    ) -> Result<(), JpegError> {
        self.bit_reader.reset();
        self.read_restart_marker(stream)?;

        self.dc_predictors.iter_mut().for_each(|p| *p = 0);
        self.eobrun = 0;
        self.restarts_to_go = restart_interval;
        if stream.unread_marker().is_some() {
            self.bit_reader.hold_at_marker();
        }
        Ok(())
    }

    fn read_restart_marker(&mut self, stream: &mut JpegStreamReader) -> Result<(), JpegError> {
        let marker = match stream.unread_marker() {
            Some(marker) => marker,
            None => {
                let marker = stream.next_marker()?;
                stream.set_unread_marker(marker);
                marker
            }
        };

        let expected = self.next_restart_num;
        if marker == JPEG_RESTART_MARKER_BASE + expected {
            stream.emit(MessageCode::TraceRestart { index: expected })?;
            stream.take_unread_marker();
        } else {
            self.resync_to_restart(stream, marker, expected)?;
        }
        self.next_restart_num = (expected + 1) % JPEG_RESTART_MARKER_RANGE;
        Ok(())
    }

    /// Recovers from a missing or out-of-order RST marker. Markers for one of
    /// the next two intervals stay unread; earlier restarts are skipped.
    fn resync_to_restart(
        &mut self,
        stream: &mut JpegStreamReader,
        mut marker: u8,
        desired: u8,
    ) -> Result<(), JpegError> {
        stream.emit(MessageCode::WarnMustResync { marker, expected: desired })?;
        let rst = |n: u8| JPEG_RESTART_MARKER_BASE + (n % JPEG_RESTART_MARKER_RANGE);

        loop {
            let is_restart = JpegMarkerCode::from_byte(marker).is_ok_and(JpegMarkerCode::is_restart);
            if marker < 0xC0 {
                // Not a valid marker: keep scanning.
            } else if !is_restart
                || marker == rst(desired.wrapping_add(1))
                || marker == rst(desired.wrapping_add(2))
            {
                return Ok(());
            } else if marker != rst(desired.wrapping_sub(1)) && marker != rst(desired.wrapping_sub(2)) {
                stream.take_unread_marker();
                return Ok(());
            }
            marker = stream.next_marker()?;
            stream.set_unread_marker(marker);
        }
    }

    fn decode_block(
        &mut self,
        stream: &mut JpegStreamReader,
        scan: &ScanInfo,
        component: &ScanComponent,
        row: usize,
        col: usize,
    ) -> Result<(), JpegError> {
        let mut block = if self.progressive {
            *self.planes[component.index].block(row, col)
        } else {
            [0; DCT_SIZE2]
        };
        if !self.progressive {
            self.decode_sequential(stream, component, &mut block)?;
        } else if scan.ss == 0 {
            if scan.ah == 0 {
                self.decode_dc_first(stream, component, scan.al, &mut block)?;
            } else {
                self.decode_dc_refine(stream, scan.al, &mut block)?;
            }
        } else if scan.ah == 0 {
            self.decode_ac_first(stream, component, scan, &mut block)?;
        } else {
            self.decode_ac_refine(stream, component, scan, &mut block)?;
        }
        *self.planes[component.index].block_mut(row, col) = block;
        Ok(())
    }

    fn decode_dc_difference(
        &mut self,
        stream: &mut JpegStreamReader,
        component: &ScanComponent,
    ) -> Result<i32, JpegError> {
        let Some(table) = component.dc_table.as_ref() else {
            return Err(JpegError::NoHuffmanTable(0));
        };
        let size = self.bit_reader.decode_huffman(stream, table)?;
        let bits = self.bit_reader.read_bits(stream, size)?;
        let value = self.dc_predictors[component.index].wrapping_add(extend(bits, size));
        self.dc_predictors[component.index] = value;
        Ok(value)
    }

    fn decode_sequential(
        &mut self,
        stream: &mut JpegStreamReader,
        component: &ScanComponent,
        block: &mut Block,
    ) -> Result<(), JpegError> {
        block[0] = self.decode_dc_difference(stream, component)? as i16;

        let Some(table) = component.ac_table.as_ref() else {
            return Err(JpegError::NoHuffmanTable(0x10));
        };
        let mut k = 1;
        while k < DCT_SIZE2 {
            let symbol = self.bit_reader.decode_huffman(stream, table)?;
            let run = (symbol >> 4) as usize;
            let size = symbol & 0x0F;
            if size != 0 {
                k += run;
                let bits = self.bit_reader.read_bits(stream, size)?;
                block[NATURAL_ORDER[k]] = extend(bits, size) as i16;
            } else if run == 15 {
                k += 15;
            } else {
                break;
            }
            k += 1;
        }
        Ok(())
    }

    fn decode_dc_first(
        &mut self,
        stream: &mut JpegStreamReader,
        component: &ScanComponent,
        al: u8,
        block: &mut Block,
    ) -> Result<(), JpegError> {
        let value = self.decode_dc_difference(stream, component)?;
        block[0] = value.wrapping_shl(al as u32) as i16;
        Ok(())
    }

    fn decode_dc_refine(
        &mut self,
        stream: &mut JpegStreamReader,
        al: u8,
        block: &mut Block,
    ) -> Result<(), JpegError> {
        if self.bit_reader.read_bit(stream)? {
            block[0] |= (1i32 << al) as i16;
        }
        Ok(())
    }

    fn read_eobrun(&mut self, stream: &mut JpegStreamReader, run: u8) -> Result<u32, JpegError> {
        let mut eobrun = 1u32 << run;
        if run != 0 {
            eobrun += self.bit_reader.read_bits(stream, run)? as u32;
        }
        Ok(eobrun)
    }

    fn decode_ac_first(
        &mut self,
        stream: &mut JpegStreamReader,
        component: &ScanComponent,
        scan: &ScanInfo,
        block: &mut Block,
    ) -> Result<(), JpegError> {
        if self.eobrun > 0 {
            self.eobrun -= 1;
            return Ok(());
        }
        let Some(table) = component.ac_table.as_ref() else {
            return Err(JpegError::NoHuffmanTable(0x10));
        };

        let mut k = scan.ss as usize;
        let se = scan.se as usize;
        while k <= se {
            let symbol = self.bit_reader.decode_huffman(stream, table)?;
            let run = symbol >> 4;
            let size = symbol & 0x0F;
            if size != 0 {
                k += run as usize;
                let bits = self.bit_reader.read_bits(stream, size)?;
                block[NATURAL_ORDER[k]] = extend(bits, size).wrapping_shl(scan.al as u32) as i16;
            } else if run == 15 {
                k += 15;
            } else {
                self.eobrun = self.read_eobrun(stream, run)? - 1;
                break;
            }
            k += 1;
        }
        Ok(())
    }

    /// Correction bit for a coefficient that is already nonzero.
    fn refine_nonzero(
        &mut self,
        stream: &mut JpegStreamReader,
        coefficient: &mut i16,
        p1: i16,
        m1: i16,
    ) -> Result<(), JpegError> {
        if self.bit_reader.read_bit(stream)? && *coefficient & p1 == 0 {
            *coefficient = coefficient.wrapping_add(if *coefficient >= 0 { p1 } else { m1 });
        }
        Ok(())
    }

    fn decode_ac_refine(
        &mut self,
        stream: &mut JpegStreamReader,
        component: &ScanComponent,
        scan: &ScanInfo,
        block: &mut Block,
    ) -> Result<(), JpegError> {
        let Some(table) = component.ac_table.as_ref() else {
            return Err(JpegError::NoHuffmanTable(0x10));
        };
        let p1 = (1i32 << scan.al) as i16;
        let m1 = ((-1i32) << scan.al) as i16;
        let se = scan.se as usize;
        let mut k = scan.ss as usize;

        if self.eobrun == 0 {
            while k <= se {
                let symbol = self.bit_reader.decode_huffman(stream, table)?;
                let mut run = (symbol >> 4) as i32;
                let size = symbol & 0x0F;
                let mut value = 0i16;
                if size != 0 {
                    if size != 1 {
                        stream.emit(MessageCode::WarnBadHuffmanCode)?;
                    }
                    value = if self.bit_reader.read_bit(stream)? { p1 } else { m1 };
                } else if run != 15 {
                    self.eobrun = self.read_eobrun(stream, run as u8)?;
                    break;
                }

                // Skip `run` zero-history coefficients, refining nonzero ones on the way.
                while k <= se {
                    let position = NATURAL_ORDER[k];
                    if block[position] != 0 {
                        self.refine_nonzero(stream, &mut block[position], p1, m1)?;
                    } else {
                        run -= 1;
                        if run < 0 {
                            break;
                        }
                    }
                    k += 1;
                }
                if value != 0 {
                    block[NATURAL_ORDER[k]] = value;
                }
                k += 1;
            }
        }

        if self.eobrun > 0 {
            while k <= se {
                let position = NATURAL_ORDER[k];
                if block[position] != 0 {
                    self.refine_nonzero(stream, &mut block[position], p1, m1)?;
                }
                k += 1;
            }
            self.eobrun -= 1;
        }
        Ok(())
    }
}
