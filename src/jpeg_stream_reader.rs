use crate::constants::{
    DCT_SIZE, DCT_SIZE2, MAXIMUM_BLOCKS_IN_MCU, MAXIMUM_COMPONENT_COUNT,
    MAXIMUM_COMPONENT_COUNT_IN_SCAN, MAXIMUM_SAMPLING_FACTOR, NATURAL_ORDER, NUM_HUFFMAN_TABLES,
    NUM_QUANT_TABLES, SEGMENT_LENGTH_SIZE,
};
use crate::error::JpegError;
use crate::input_source::InputSource;
use crate::jpeg_marker_code::{JPEG_MARKER_START_BYTE, JpegMarkerCode};
use crate::jpeg1::huffman::{HuffmanTable, TableClass};
use crate::marker_processor::MarkerInterceptors;
use crate::message::{ErrorManager, MessageCode};
use crate::{CodingProcess, ColorSpace, FrameInfo};

#[derive(Debug, Clone, Default)]
pub struct JpegComponent {
    pub id: u8,
    pub index: usize,
    pub h_samp_factor: u8,
    pub v_samp_factor: u8,
    pub quant_table_dest: u8,
    pub dc_table_dest: u8,
    pub ac_table_dest: u8,
    pub width_in_blocks: usize,
    pub height_in_blocks: usize,
}

/// Parameters of the scan whose SOS was read last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanInfo {
    pub component_indices: Vec<usize>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegStreamReaderState {
    BeforeStartOfImage,
    HeaderSection,
    ScanSection,
    EndOfImage,
}

/// Where `read_markers` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStop {
    StartOfScan,
    EndOfImage,
}

pub struct JpegStreamReader {
    source: InputSource,
    err: ErrorManager,
    interceptors: MarkerInterceptors,
    state: JpegStreamReaderState,
    frame_info: Option<FrameInfo>,
    scan: ScanInfo,
    unread_marker: Option<u8>,
    saw_jfif_marker: bool,
    adobe_transform: Option<u8>,
    max_h_samp_factor: u8,
    max_v_samp_factor: u8,
    pub quantization_tables: [Option<[u16; DCT_SIZE2]>; NUM_QUANT_TABLES],
    pub huffman_tables_dc: [Option<HuffmanTable>; NUM_HUFFMAN_TABLES],
    pub huffman_tables_ac: [Option<HuffmanTable>; NUM_HUFFMAN_TABLES],
    pub components: Vec<JpegComponent>,
    pub restart_interval: u16,
}

impl JpegStreamReader {
    pub fn new(source: InputSource, err: ErrorManager, interceptors: MarkerInterceptors) -> Self {
        Self {
            source,
            err,
            interceptors,
            state: JpegStreamReaderState::BeforeStartOfImage,
            frame_info: None,
            scan: ScanInfo::default(),
            unread_marker: None,
            saw_jfif_marker: false,
            adobe_transform: None,
            max_h_samp_factor: 1,
            max_v_samp_factor: 1,
            quantization_tables: [None; NUM_QUANT_TABLES],
            huffman_tables_dc: [const { None }; NUM_HUFFMAN_TABLES],
            huffman_tables_ac: [const { None }; NUM_HUFFMAN_TABLES],
            components: Vec::new(),
            restart_interval: 0,
        }
    }

    pub fn state(&self) -> JpegStreamReaderState {
        self.state
    }

    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.frame_info
    }

    pub fn scan(&self) -> &ScanInfo {
        &self.scan
    }

    pub fn max_h_samp_factor(&self) -> u8 {
        self.max_h_samp_factor
    }

    pub fn max_v_samp_factor(&self) -> u8 {
        self.max_v_samp_factor
    }

    pub fn saw_jfif_marker(&self) -> bool {
        self.saw_jfif_marker
    }

    pub fn adobe_transform(&self) -> Option<u8> {
        self.adobe_transform
    }

    pub fn source(&self) -> &InputSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut InputSource {
        &mut self.source
    }

    pub fn replace_source(&mut self, source: InputSource) -> InputSource {
        std::mem::replace(&mut self.source, source)
    }

    pub fn err(&self) -> &ErrorManager {
        &self.err
    }

    pub fn err_mut(&mut self) -> &mut ErrorManager {
        &mut self.err
    }

    pub fn interceptors(&self) -> &MarkerInterceptors {
        &self.interceptors
    }

    pub fn interceptors_mut(&mut self) -> &mut MarkerInterceptors {
        &mut self.interceptors
    }

    /// Routes a diagnostic through the error manager.
    pub fn emit(&mut self, code: MessageCode) -> Result<(), JpegError> {
        self.err.emit_message(code, &mut self.source)
    }

    /// A marker code the entropy decoder ran into and left for the marker reader.
    pub fn unread_marker(&self) -> Option<u8> {
        self.unread_marker
    }

    pub fn set_unread_marker(&mut self, code: u8) {
        self.unread_marker = Some(code);
    }

    pub fn take_unread_marker(&mut self) -> Option<u8> {
        self.unread_marker.take()
    }

    pub fn next_byte(&mut self) -> Result<u8, JpegError> {
        self.source.next_byte()
    }

    fn read_u8(&mut self) -> Result<u8, JpegError> {
        self.source.next_byte()
    }

    fn read_u16(&mut self) -> Result<u16, JpegError> {
        self.source.read_u16()
    }

    /// Reads the header up to the first SOS and derives the color spaces.
    pub fn read_header(&mut self) -> Result<(), JpegError> {
        if self.state != JpegStreamReaderState::BeforeStartOfImage {
            return Err(JpegError::BadState(self.state as u8));
        }
        self.read_start_of_image()?;

        match self.read_markers()? {
            MarkerStop::StartOfScan => {
                self.default_color_spaces()?;
                Ok(())
            }
            MarkerStop::EndOfImage => Err(JpegError::NoImage),
        }
    }

    /// Processes markers until the next SOS or EOI.
    pub fn read_markers(&mut self) -> Result<MarkerStop, JpegError> {
        loop {
            let code = match self.unread_marker.take() {
                Some(code) => code,
                None => self.next_marker()?,
            };
            let marker = JpegMarkerCode::from_byte(code)?;

            match marker {
                JpegMarkerCode::StartOfImage => {
                    return Err(JpegError::DuplicateStartOfImage);
                }
                JpegMarkerCode::StartOfFrameBaseline => {
                    self.read_start_of_frame_segment(marker, CodingProcess::Baseline)?;
                }
                JpegMarkerCode::StartOfFrameExtended => {
                    self.read_start_of_frame_segment(marker, CodingProcess::ExtendedSequential)?;
                }
                JpegMarkerCode::StartOfFrameProgressive => {
                    self.read_start_of_frame_segment(marker, CodingProcess::Progressive)?;
                }
                JpegMarkerCode::StartOfFrameExtendedArithmetic
                | JpegMarkerCode::StartOfFrameProgressiveArithmetic
                | JpegMarkerCode::StartOfFrameLosslessArithmetic
                | JpegMarkerCode::StartOfFrameDifferentialSequentialArithmetic
                | JpegMarkerCode::StartOfFrameDifferentialProgressiveArithmetic
                | JpegMarkerCode::StartOfFrameDifferentialLosslessArithmetic => {
                    return Err(JpegError::ArithmeticNotImplemented);
                }
                JpegMarkerCode::StartOfFrameLossless
                | JpegMarkerCode::StartOfFrameDifferentialSequential
                | JpegMarkerCode::StartOfFrameDifferentialProgressive
                | JpegMarkerCode::StartOfFrameDifferentialLossless => {
                    return Err(JpegError::SofUnsupported(code));
                }
                JpegMarkerCode::StartOfScan => {
                    self.read_start_of_scan_segment()?;
                    return Ok(MarkerStop::StartOfScan);
                }
                JpegMarkerCode::EndOfImage => {
                    self.state = JpegStreamReaderState::EndOfImage;
                    self.emit(MessageCode::TraceEndOfImage)?;
                    return Ok(MarkerStop::EndOfImage);
                }
                JpegMarkerCode::DefineHuffmanTable => {
                    self.read_dht_segment()?;
                }
                JpegMarkerCode::DefineQuantizationTable => {
                    self.read_dqt_segment()?;
                }
                JpegMarkerCode::DefineRestartInterval => {
                    self.read_dri_segment()?;
                }
                JpegMarkerCode::DefineArithmeticConditioning => {
                    self.skip_segment(code)?;
                }
                JpegMarkerCode::DefineNumberOfLines => {
                    self.emit(MessageCode::TraceDefineNumberOfLines)?;
                    self.skip_segment(code)?;
                }
                JpegMarkerCode::Temporary
                | JpegMarkerCode::Restart0
                | JpegMarkerCode::Restart1
                | JpegMarkerCode::Restart2
                | JpegMarkerCode::Restart3
                | JpegMarkerCode::Restart4
                | JpegMarkerCode::Restart5
                | JpegMarkerCode::Restart6
                | JpegMarkerCode::Restart7 => {
                    // Parameterless; stray ones outside a scan are ignored.
                    self.emit(MessageCode::TraceMiscMarker { marker: code, length: 0 })?;
                }
                JpegMarkerCode::JpegExtension
                | JpegMarkerCode::DefineHierarchicalProgression
                | JpegMarkerCode::ExpandReferenceComponents => {
                    return Err(JpegError::UnknownMarker(code));
                }
                JpegMarkerCode::Comment
                | JpegMarkerCode::ApplicationData0
                | JpegMarkerCode::ApplicationData1
                | JpegMarkerCode::ApplicationData2
                | JpegMarkerCode::ApplicationData3
                | JpegMarkerCode::ApplicationData4
                | JpegMarkerCode::ApplicationData5
                | JpegMarkerCode::ApplicationData6
                | JpegMarkerCode::ApplicationData7
                | JpegMarkerCode::ApplicationData8
                | JpegMarkerCode::ApplicationData9
                | JpegMarkerCode::ApplicationData10
                | JpegMarkerCode::ApplicationData11
                | JpegMarkerCode::ApplicationData12
                | JpegMarkerCode::ApplicationData13
                | JpegMarkerCode::ApplicationData14
                | JpegMarkerCode::ApplicationData15 => {
                    self.read_auxiliary_segment(marker)?;
                }
            }
        }
    }

    /// Finds the next marker, skipping (and reporting) any garbage before it.
    pub fn next_marker(&mut self) -> Result<u8, JpegError> {
        let mut discarded = 0usize;
        loop {
            let mut byte = self.read_u8()?;
            while byte != JPEG_MARKER_START_BYTE {
                discarded += 1;
                byte = self.read_u8()?;
            }
            // Any number of fill bytes may precede the marker code.
            while byte == JPEG_MARKER_START_BYTE {
                byte = self.read_u8()?;
            }
            if byte != 0 {
                if discarded != 0 {
                    self.emit(MessageCode::WarnExtraneousData {
                        count: discarded,
                        marker: byte,
                    })?;
                }
                return Ok(byte);
            }
            // A stuffed zero is data, not a marker.
            discarded += 2;
        }
    }

    fn read_start_of_image(&mut self) -> Result<(), JpegError> {
        let first = self.read_u8()?;
        let second = self.read_u8()?;
        if first != JPEG_MARKER_START_BYTE || second != JpegMarkerCode::StartOfImage as u8 {
            return Err(JpegError::NoSoi(first, second));
        }
        self.emit(MessageCode::TraceStartOfImage)?;
        self.state = JpegStreamReaderState::HeaderSection;
        Ok(())
    }

    fn read_start_of_frame_segment(
        &mut self,
        marker: JpegMarkerCode,
        process: CodingProcess,
    ) -> Result<(), JpegError> {
        if self.frame_info.is_some() {
            return Err(JpegError::DuplicateStartOfFrame);
        }

        let length = self.read_u16()? as usize;
        let bits_per_sample = self.read_u8()?;
        let height = self.read_u16()?;
        let width = self.read_u16()?;
        let component_count = self.read_u8()? as usize;

        self.emit(MessageCode::TraceStartOfFrame {
            marker: marker.code(),
            width,
            height,
            components: component_count as u8,
        })?;

        let precision_ok = match process {
            CodingProcess::Baseline => bits_per_sample == 8,
            _ => bits_per_sample == 8 || bits_per_sample == 12,
        };
        if !precision_ok {
            return Err(JpegError::BadPrecision(bits_per_sample));
        }
        if width == 0 || height == 0 {
            return Err(JpegError::EmptyImage);
        }
        if component_count == 0 || component_count > MAXIMUM_COMPONENT_COUNT {
            return Err(JpegError::ComponentCount(component_count, MAXIMUM_COMPONENT_COUNT));
        }
        if length != 8 + component_count * 3 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }

        self.components.clear();
        for index in 0..component_count {
            let id = self.read_u8()?;
            let sampling = self.read_u8()?;
            let quant_table_dest = self.read_u8()?;
            let h_samp_factor = sampling >> 4;
            let v_samp_factor = sampling & 0x0F;

            if !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&h_samp_factor)
                || !(1..=MAXIMUM_SAMPLING_FACTOR).contains(&v_samp_factor)
            {
                return Err(JpegError::BadSampling);
            }
            if quant_table_dest as usize >= NUM_QUANT_TABLES {
                return Err(JpegError::BadDqtIndex(quant_table_dest));
            }
            if self.components.iter().any(|c| c.id == id) {
                return Err(JpegError::DuplicateComponentId(id));
            }

            self.components.push(JpegComponent {
                id,
                index,
                h_samp_factor,
                v_samp_factor,
                quant_table_dest,
                ..JpegComponent::default()
            });
        }

        self.max_h_samp_factor = self.components.iter().map(|c| c.h_samp_factor).max().unwrap_or(1);
        self.max_v_samp_factor = self.components.iter().map(|c| c.v_samp_factor).max().unwrap_or(1);
        let max_h = self.max_h_samp_factor as usize;
        let max_v = self.max_v_samp_factor as usize;
        for component in &mut self.components {
            component.width_in_blocks =
                (width as usize * component.h_samp_factor as usize).div_ceil(max_h * DCT_SIZE);
            component.height_in_blocks =
                (height as usize * component.v_samp_factor as usize).div_ceil(max_v * DCT_SIZE);
        }

        self.frame_info = Some(FrameInfo {
            width: width as u32,
            height: height as u32,
            bits_per_sample,
            component_count,
            process,
            jpeg_color_space: ColorSpace::Unknown,
            out_color_space: ColorSpace::Unknown,
        });
        Ok(())
    }

    fn read_start_of_scan_segment(&mut self) -> Result<(), JpegError> {
        let Some(frame_info) = self.frame_info else {
            return Err(JpegError::StartOfScanBeforeFrame);
        };

        let length = self.read_u16()? as usize;
        let components_in_scan = self.read_u8()? as usize;
        self.emit(MessageCode::TraceStartOfScan {
            components: components_in_scan as u8,
        })?;

        if components_in_scan == 0 || components_in_scan > MAXIMUM_COMPONENT_COUNT_IN_SCAN {
            return Err(JpegError::ComponentCount(
                components_in_scan,
                MAXIMUM_COMPONENT_COUNT_IN_SCAN,
            ));
        }
        if length != 6 + components_in_scan * 2 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }

        let mut component_indices = Vec::with_capacity(components_in_scan);
        for _ in 0..components_in_scan {
            let id = self.read_u8()?;
            let selector = self.read_u8()?;
            let dc_dest = selector >> 4;
            let ac_dest = selector & 0x0F;
            if dc_dest as usize >= NUM_HUFFMAN_TABLES {
                return Err(JpegError::NoHuffmanTable(dc_dest));
            }
            if ac_dest as usize >= NUM_HUFFMAN_TABLES {
                return Err(JpegError::NoHuffmanTable(0x10 | ac_dest));
            }

            let index = self
                .components
                .iter()
                .position(|c| c.id == id)
                .ok_or(JpegError::BadComponentId(id))?;
            if component_indices.contains(&index) {
                return Err(JpegError::BadComponentId(id));
            }
            let component = &mut self.components[index];
            component.dc_table_dest = dc_dest;
            component.ac_table_dest = ac_dest;
            component_indices.push(index);
        }

        let ss = self.read_u8()?;
        let se = self.read_u8()?;
        let ah_al = self.read_u8()?;
        let (mut ss, mut se, mut ah, mut al) = (ss, se, ah_al >> 4, ah_al & 0x0F);
        self.emit(MessageCode::TraceProgression { ss, se, ah, al })?;

        if frame_info.process == CodingProcess::Progressive {
            let bad = if ss == 0 {
                se != 0
            } else {
                se < ss || se as usize >= DCT_SIZE2 || components_in_scan != 1
            };
            if bad || ah > 13 || al > 13 {
                return Err(JpegError::BadProgression(ss, se, ah, al));
            }
        } else if ss != 0 || se as usize != DCT_SIZE2 - 1 || ah != 0 || al != 0 {
            self.emit(MessageCode::WarnNotSequential)?;
            (ss, se, ah, al) = (0, (DCT_SIZE2 - 1) as u8, 0, 0);
        }

        if components_in_scan > 1 {
            let blocks_in_mcu: usize = component_indices
                .iter()
                .map(|&i| {
                    let c = &self.components[i];
                    c.h_samp_factor as usize * c.v_samp_factor as usize
                })
                .sum();
            if blocks_in_mcu > MAXIMUM_BLOCKS_IN_MCU {
                return Err(JpegError::BadSampling);
            }
        }

        self.scan = ScanInfo {
            component_indices,
            ss,
            se,
            ah,
            al,
        };
        self.state = JpegStreamReaderState::ScanSection;
        Ok(())
    }

    pub fn read_dht_segment(&mut self) -> Result<(), JpegError> {
        let length = self.read_u16()? as usize;
        let mut remaining = length
            .checked_sub(SEGMENT_LENGTH_SIZE)
            .ok_or(JpegError::InvalidMarkerSegmentSize)?;

        while remaining > 16 {
            let tc_th = self.read_u8()?;
            let class = tc_th >> 4;
            let id = tc_th & 0x0F;
            if class > 1 || id as usize >= NUM_HUFFMAN_TABLES {
                return Err(JpegError::BadDhtIndex(tc_th));
            }
            self.emit(MessageCode::TraceHuffmanTable { index: tc_th })?;

            let mut lengths = [0u8; 16];
            let mut total_values = 0usize;
            for length in lengths.iter_mut() {
                *length = self.read_u8()?;
                total_values += *length as usize;
            }
            remaining -= 17;

            if total_values > 256 || total_values > remaining {
                return Err(JpegError::BadHuffmanTable);
            }

            let mut values = vec![0u8; total_values];
            for value in values.iter_mut() {
                *value = self.read_u8()?;
            }
            remaining -= total_values;

            if class == 0 {
                let table = HuffmanTable::build_from_dht(TableClass::Dc, &lengths, &values)?;
                self.huffman_tables_dc[id as usize] = Some(table);
            } else {
                let table = HuffmanTable::build_from_dht(TableClass::Ac, &lengths, &values)?;
                self.huffman_tables_ac[id as usize] = Some(table);
            }
        }

        if remaining != 0 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        Ok(())
    }

    pub fn read_dqt_segment(&mut self) -> Result<(), JpegError> {
        let length = self.read_u16()? as usize;
        let mut remaining = length
            .checked_sub(SEGMENT_LENGTH_SIZE)
            .ok_or(JpegError::InvalidMarkerSegmentSize)?;

        while remaining > 0 {
            let pq_tq = self.read_u8()?;
            let precision = pq_tq >> 4;
            let id = pq_tq & 0x0F;
            if id as usize >= NUM_QUANT_TABLES || precision > 1 {
                return Err(JpegError::BadDqtIndex(pq_tq));
            }
            self.emit(MessageCode::TraceQuantizationTable { index: id, precision })?;

            let entry_size = if precision == 0 { 1 } else { 2 };
            let needed = 1 + DCT_SIZE2 * entry_size;
            if remaining < needed {
                return Err(JpegError::InvalidMarkerSegmentSize);
            }

            let mut table = [0u16; DCT_SIZE2];
            for &natural in NATURAL_ORDER.iter().take(DCT_SIZE2) {
                table[natural] = if precision == 0 {
                    self.read_u8()? as u16
                } else {
                    self.read_u16()?
                };
            }
            self.quantization_tables[id as usize] = Some(table);
            remaining -= needed;
        }
        Ok(())
    }

    pub fn read_dri_segment(&mut self) -> Result<(), JpegError> {
        let length = self.read_u16()?;
        if length != 4 {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        self.restart_interval = self.read_u16()?;
        self.emit(MessageCode::TraceRestartInterval {
            interval: self.restart_interval,
        })?;
        Ok(())
    }

    /// COM and APPn: an installed interceptor wins over built-in handling.
    fn read_auxiliary_segment(&mut self, marker: JpegMarkerCode) -> Result<(), JpegError> {
        if let Some(processor) = self.interceptors.processor_for(marker) {
            return self
                .interceptors
                .process(marker, processor, &mut self.source, &mut self.err);
        }

        match marker {
            JpegMarkerCode::ApplicationData0 => self.read_app0_segment(),
            JpegMarkerCode::ApplicationData14 => self.read_app14_segment(),
            _ => self.skip_segment(marker.code()),
        }
    }

    fn read_app0_segment(&mut self) -> Result<(), JpegError> {
        const JFIF_HEADER_LENGTH: usize = 14;
        let payload = self.read_payload_prefix(JFIF_HEADER_LENGTH)?;

        if payload.len == JFIF_HEADER_LENGTH && payload.bytes.starts_with(b"JFIF\0") {
            self.saw_jfif_marker = true;
            self.emit(MessageCode::TraceJfif {
                major: payload.bytes[5],
                minor: payload.bytes[6],
            })?;
        } else {
            self.emit(MessageCode::TraceMiscMarker {
                marker: JpegMarkerCode::ApplicationData0.code(),
                length: payload.total as u16,
            })?;
        }
        self.source.skip(payload.total - payload.len)
    }

    fn read_app14_segment(&mut self) -> Result<(), JpegError> {
        const ADOBE_HEADER_LENGTH: usize = 12;
        let payload = self.read_payload_prefix(ADOBE_HEADER_LENGTH)?;

        if payload.len == ADOBE_HEADER_LENGTH && payload.bytes.starts_with(b"Adobe") {
            let transform = payload.bytes[11];
            self.adobe_transform = Some(transform);
            self.emit(MessageCode::TraceAdobe { transform })?;
        } else {
            self.emit(MessageCode::TraceMiscMarker {
                marker: JpegMarkerCode::ApplicationData14.code(),
                length: payload.total as u16,
            })?;
        }
        self.source.skip(payload.total - payload.len)
    }

    /// Reads the length field and up to `limit` leading payload bytes.
    fn read_payload_prefix(&mut self, limit: usize) -> Result<PayloadPrefix, JpegError> {
        let total = (self.read_u16()? as usize)
            .checked_sub(SEGMENT_LENGTH_SIZE)
            .ok_or(JpegError::InvalidMarkerSegmentSize)?;
        let len = total.min(limit);
        let mut bytes = [0u8; 16];
        for byte in bytes.iter_mut().take(len) {
            *byte = self.read_u8()?;
        }
        Ok(PayloadPrefix { bytes, len, total })
    }

    pub fn skip_segment(&mut self, code: u8) -> Result<(), JpegError> {
        let length = self.read_u16()?;
        if (length as usize) < SEGMENT_LENGTH_SIZE {
            return Err(JpegError::InvalidMarkerSegmentSize);
        }
        self.emit(MessageCode::TraceMiscMarker { marker: code, length })?;
        self.source.skip(length as usize - SEGMENT_LENGTH_SIZE)
    }

    /// Derives the coded and output color spaces from component count, JFIF,
    /// Adobe and component identifiers.
    fn default_color_spaces(&mut self) -> Result<(), JpegError> {
        let Some(mut frame_info) = self.frame_info else {
            return Err(JpegError::NoScan);
        };

        let (jpeg_color_space, out_color_space) = match frame_info.component_count {
            1 => (ColorSpace::Grayscale, ColorSpace::Grayscale),
            3 => {
                let space = if self.saw_jfif_marker {
                    ColorSpace::YCbCr
                } else if let Some(transform) = self.adobe_transform {
                    match transform {
                        0 => ColorSpace::Rgb,
                        1 => ColorSpace::YCbCr,
                        _ => {
                            self.emit(MessageCode::WarnAdobeTransform { transform })?;
                            ColorSpace::YCbCr
                        }
                    }
                } else {
                    let ids: Vec<u8> = self.components.iter().map(|c| c.id).collect();
                    if ids == [b'R', b'G', b'B'] {
                        ColorSpace::Rgb
                    } else {
                        ColorSpace::YCbCr
                    }
                };
                (space, ColorSpace::Rgb)
            }
            4 => {
                let space = match self.adobe_transform {
                    None | Some(0) => ColorSpace::Cmyk,
                    Some(2) => ColorSpace::Ycck,
                    Some(transform) => {
                        self.emit(MessageCode::WarnAdobeTransform { transform })?;
                        ColorSpace::Ycck
                    }
                };
                (space, ColorSpace::Cmyk)
            }
            _ => (ColorSpace::Unknown, ColorSpace::Unknown),
        };

        frame_info.jpeg_color_space = jpeg_color_space;
        frame_info.out_color_space = out_color_space;
        self.frame_info = Some(frame_info);
        Ok(())
    }
}

struct PayloadPrefix {
    bytes: [u8; 16],
    len: usize,
    total: usize,
}
