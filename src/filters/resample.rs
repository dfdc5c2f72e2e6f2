//! `resample`: convert sample format and channel layout.
//!
//! Arguments are `sample_fmt:channel_layout`; either field may be `-1` or
//! `auto` to keep what the input carries. Samples are converted to the
//! output format first and then remixed. Output batches are always packed.

use super::{arg_fields, invalid_args, is_keep};
use crate::buffer::{AudioProps, BufferRef, Perms, SampleSpec};
use crate::error::{Error, PadDirection, Result};
use crate::filter::{FilterOps, FilterTemplate, InputPad, InputPadOps, OutputPad, OutputPadOps};
use crate::format::{ChannelLayout, Format, MediaType, SampleFormat};
use crate::graph::{FilterGraph, FilterId, LinkId};
use std::any::Any;
use std::sync::Arc;

pub(crate) fn resample() -> Arc<FilterTemplate> {
    FilterTemplate::builder("resample")
        .description("Reformat the input audio to sample_fmt:channel_layout.")
        .input(
            InputPad::audio("default")
                .with_min_perms(Perms::READ)
                .with_handler(ResampleInput),
        )
        .output(OutputPad::audio("default").with_handler(ResampleOutput))
        .ops(Resample)
        .build()
}

/// Channel remix between two layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remix {
    /// Same layout on both sides.
    Identity,
    /// Average left and right.
    StereoToMono,
    /// Duplicate the single channel.
    MonoToStereo,
    /// Keep left and right, derive the center from both, leave the rest silent.
    StereoToSurround51,
}

impl Remix {
    /// The remix turning `from` into `to`, if supported.
    pub fn between(from: ChannelLayout, to: ChannelLayout) -> Option<Self> {
        match (from, to) {
            _ if from == to => Some(Remix::Identity),
            (ChannelLayout::STEREO, ChannelLayout::MONO) => Some(Remix::StereoToMono),
            (ChannelLayout::MONO, ChannelLayout::STEREO) => Some(Remix::MonoToStereo),
            (ChannelLayout::STEREO, ChannelLayout::LAYOUT_5_1) => Some(Remix::StereoToSurround51),
            _ => None,
        }
    }

    /// Remix one sample frame already converted to `format`.
    ///
    /// Integer formats average with an arithmetic shift, like `(l + r) >> 1`.
    pub fn apply(self, frame: &[f64], format: SampleFormat, out: &mut Vec<f64>) {
        let at = |i: usize| frame.get(i).copied().unwrap_or_else(|| silence(format));
        match self {
            Remix::Identity => out.extend_from_slice(frame),
            Remix::StereoToMono => {
                let (l, r) = (at(0), at(1));
                out.push(if format.is_float() {
                    (l + r) / 2.0
                } else {
                    ((l as i64 + r as i64) >> 1) as f64
                });
            }
            Remix::MonoToStereo => {
                let v = at(0);
                out.extend_from_slice(&[v, v]);
            }
            Remix::StereoToSurround51 => {
                let (l, r) = (at(0), at(1));
                let center = if format.is_float() {
                    l / 2.0 + r / 2.0
                } else {
                    (l as i64 / 2 + r as i64 / 2) as f64
                };
                // FL FR FC LFE SL SR
                let s = silence(format);
                out.extend_from_slice(&[l, r, center, s, s, s]);
            }
        }
    }
}

fn silence(format: SampleFormat) -> f64 {
    match format {
        SampleFormat::U8 => 128.0,
        _ => 0.0,
    }
}

fn read_sample(format: SampleFormat, bytes: &[u8]) -> f64 {
    let mut raw = [0u8; 8];
    raw[..bytes.len().min(8)].copy_from_slice(&bytes[..bytes.len().min(8)]);
    match format {
        SampleFormat::U8 => f64::from(raw[0]),
        SampleFormat::S16 => f64::from(i16::from_ne_bytes([raw[0], raw[1]])),
        SampleFormat::S32 => f64::from(i32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        SampleFormat::Flt => f64::from(f32::from_ne_bytes([raw[0], raw[1], raw[2], raw[3]])),
        SampleFormat::Dbl => f64::from_ne_bytes(raw),
    }
}

fn write_sample(format: SampleFormat, v: f64, out: &mut [u8]) {
    match format {
        SampleFormat::U8 => out[0] = v as u8,
        SampleFormat::S16 => out.copy_from_slice(&(v as i16).to_ne_bytes()),
        SampleFormat::S32 => out.copy_from_slice(&(v as i32).to_ne_bytes()),
        SampleFormat::Flt => out.copy_from_slice(&(v as f32).to_ne_bytes()),
        SampleFormat::Dbl => out.copy_from_slice(&v.to_ne_bytes()),
    }
}

/// Convert one sample value between encodings.
///
/// Integer widening shifts left, narrowing shifts right; unsigned 8-bit is
/// re-centered around 0x80. Floats map `[-1, 1)` onto the integer range,
/// rounding to nearest and clipping.
fn convert(from: SampleFormat, to: SampleFormat, v: f64) -> f64 {
    use SampleFormat::*;

    const S31: f64 = 2_147_483_648.0;
    match (from, to) {
        (U8, S16) => ((v as i64 - 0x80) << 8) as f64,
        (U8, S32) => ((v as i64 - 0x80) << 24) as f64,
        (U8, Flt | Dbl) => (v - 128.0) / 128.0,
        (S16, U8) => (((v as i64) >> 8) + 0x80) as f64,
        (S16, S32) => ((v as i64) << 16) as f64,
        (S16, Flt | Dbl) => v / 32_768.0,
        (S32, U8) => (((v as i64) >> 24) + 0x80) as f64,
        (S32, S16) => ((v as i64) >> 16) as f64,
        (S32, Flt | Dbl) => v / S31,
        (Flt | Dbl, U8) => ((v * 128.0).round_ties_even() + 128.0).clamp(0.0, 255.0),
        (Flt | Dbl, S16) => (v * 32_768.0).round_ties_even().clamp(-32_768.0, 32_767.0),
        (Flt | Dbl, S32) => (v * S31)
            .round_ties_even()
            .clamp(f64::from(i32::MIN), f64::from(i32::MAX)),
        _ => v,
    }
}

/// Convert and remix a batch into packed bytes of `to`.
fn convert_batch(
    samples: &BufferRef,
    props: &AudioProps,
    to: SampleFormat,
    out_channels: usize,
    remix: Remix,
) -> Vec<u8> {
    let from = props.sample_format;
    let in_channels = props.channel_layout.channels();
    let (ib, ob) = (from.bytes(), to.bytes());
    let guard = samples.read();

    let mut frame = Vec::with_capacity(in_channels);
    let mut mixed = Vec::with_capacity(out_channels);
    let mut bytes = vec![0u8; props.samples * out_channels * ob];
    for i in 0..props.samples {
        frame.clear();
        for ch in 0..in_channels {
            let (plane, offset) = if props.planar {
                (ch, i * ib)
            } else {
                (0, (i * in_channels + ch) * ib)
            };
            let raw = guard
                .plane(plane)
                .and_then(|p| p.get(offset..offset + ib))
                .map_or_else(|| silence(from), |b| read_sample(from, b));
            frame.push(convert(from, to, raw));
        }

        mixed.clear();
        remix.apply(&frame, to, &mut mixed);
        for (ch, v) in mixed.iter().take(out_channels).enumerate() {
            let at = (i * out_channels + ch) * ob;
            write_sample(to, *v, &mut bytes[at..at + ob]);
        }
    }
    bytes
}

#[derive(Debug, Clone, Copy, Default)]
struct ResampleState {
    out_format: Option<SampleFormat>,
    out_layout: Option<ChannelLayout>,
}

struct Resample;

impl FilterOps for Resample {
    fn new_state(&self) -> Box<dyn Any + Send> {
        Box::new(ResampleState::default())
    }

    fn init(
        &self,
        graph: &mut FilterGraph,
        filter: FilterId,
        args: Option<&str>,
        _opaque: Option<&mut dyn Any>,
    ) -> Result<()> {
        let fields = arg_fields(args);
        let mut state = ResampleState::default();
        if let Some(f) = fields.first().filter(|f| !is_keep(f)) {
            state.out_format = Some(
                f.parse()
                    .map_err(|e| invalid_args(graph, filter, format!("{}", e)))?,
            );
        }
        if let Some(l) = fields.get(1).filter(|l| !is_keep(l)) {
            let layout: ChannelLayout = l
                .parse()
                .map_err(|e| invalid_args(graph, filter, format!("{}", e)))?;
            if layout.is_empty() {
                return Err(invalid_args(graph, filter, "channel layout has no channels"));
            }
            state.out_layout = Some(layout);
        }
        tracing::debug!(
            filter = %graph.filter_name(filter),
            format = ?state.out_format,
            layout = ?state.out_layout,
            "resample configured"
        );
        *graph.state_mut::<ResampleState>(filter)? = state;
        Ok(())
    }

    fn query_formats(&self, graph: &mut FilterGraph, filter: FilterId) -> Result<()> {
        let state = *graph.state::<ResampleState>(filter)?;
        let input = graph.make_format_list(Format::all(MediaType::Audio));
        graph.ref_input_formats(filter, 0, input)?;
        let output = match state.out_format {
            Some(f) => graph.make_format_list([Format::from(f)]),
            None => graph.make_format_list(Format::all(MediaType::Audio)),
        };
        graph.ref_output_formats(filter, 0, output)
    }
}

struct ResampleInput;

impl InputPadOps for ResampleInput {
    fn filter_samples(&self, graph: &mut FilterGraph, link: LinkId, samples: BufferRef) -> Result<()> {
        let out = graph.require_first_output(link)?;
        let filter = graph.get_link(link)?.dst();
        let (out_format, out_layout) = {
            let o = graph.get_link(out)?;
            let format = o.format.and_then(Format::sample).ok_or_else(|| Error::FormatUnresolved {
                src: graph.filter_name(o.src()),
                dst: graph.filter_name(o.dst()),
            })?;
            (format, o.channel_layout)
        };
        let props = samples.audio().cloned().ok_or(Error::WrongMedia {
            expected: MediaType::Audio,
        })?;
        if props.samples == 0 {
            return Ok(());
        }
        let remix = Remix::between(props.channel_layout, out_layout).ok_or_else(|| {
            invalid_args(
                graph,
                filter,
                format!("cannot remix {} to {}", props.channel_layout, out_layout),
            )
        })?;

        let bytes = convert_batch(&samples, &props, out_format, out_layout.channels(), remix);
        let spec = SampleSpec {
            size: bytes.len(),
            channel_layout: out_layout,
            sample_format: out_format,
            planar: false,
        };
        let mut batch = graph.get_audio_buffer(out, Perms::WRITE, spec)?;
        batch.pts = samples.pts;
        batch.pos = samples.pos;
        if let Some(a) = batch.audio_mut() {
            a.sample_rate = props.sample_rate;
        }
        {
            let mut guard = batch.write()?;
            if let Some(plane) = guard.plane_mut(0) {
                let n = plane.len().min(bytes.len());
                plane[..n].copy_from_slice(&bytes[..n]);
            }
        }
        drop(samples);
        graph.filter_samples(out, batch)
    }
}

struct ResampleOutput;

impl OutputPadOps for ResampleOutput {
    fn config_props(&self, graph: &mut FilterGraph, link: LinkId) -> Result<()> {
        let (src, dst) = {
            let l = graph.get_link(link)?;
            (l.src(), l.dst())
        };
        let input = graph.get_filter(src)?.input(0).ok_or_else(|| Error::NotConnected {
            filter: graph.filter_name(src),
            direction: PadDirection::Input,
            index: 0,
        })?;
        let (in_layout, rate) = {
            let i = graph.get_link(input)?;
            (i.channel_layout, i.sample_rate)
        };
        let state = *graph.state::<ResampleState>(src)?;
        let layout = state.out_layout.unwrap_or(in_layout);
        if Remix::between(in_layout, layout).is_none() {
            return Err(Error::LinkConfig {
                src: graph.filter_name(src),
                dst: graph.filter_name(dst),
                reason: format!("cannot remix {} to {}", in_layout, layout),
            });
        }

        let l = graph.link_mut(link)?;
        l.channel_layout = layout;
        l.sample_rate = rate;
        tracing::debug!(from = %in_layout, to = %layout, sample_rate = rate, "resample output configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{add_samples, pull_samples};

    fn s16_bytes(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn s16_values(batch: &BufferRef) -> Vec<i16> {
        let guard = batch.read();
        let size = batch.audio().unwrap().size;
        guard.plane(0).unwrap()[..size]
            .chunks_exact(2)
            .map(|c| i16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }

    fn chain(src_args: &str, resample_args: Option<&str>) -> (FilterGraph, FilterId, FilterId) {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("abuffer", None).unwrap();
        graph.init_filter(src, Some(src_args), None).unwrap();
        let conv = graph.open_by_name("resample", None).unwrap();
        graph.init_filter(conv, resample_args, None).unwrap();
        let sink = graph.open_by_name("abuffersink", None).unwrap();
        graph.link(src, 0, conv, 0).unwrap();
        graph.link(conv, 0, sink, 0).unwrap();
        graph.configure().unwrap();
        (graph, src, sink)
    }

    #[test]
    fn test_convert_table() {
        use SampleFormat::*;
        assert_eq!(convert(U8, S16, 128.0), 0.0);
        assert_eq!(convert(U8, S16, 255.0), 32_512.0);
        assert_eq!(convert(S16, U8, -32_768.0), 0.0);
        assert_eq!(convert(S16, U8, 32_767.0), 255.0);
        assert_eq!(convert(S16, S32, -1.0), -65_536.0);
        assert_eq!(convert(S32, S16, 65_536.0), 1.0);
        assert_eq!(convert(S16, Flt, 16_384.0), 0.5);
        assert_eq!(convert(Flt, S16, 1.0), 32_767.0);
        assert_eq!(convert(Flt, S16, -1.0), -32_768.0);
        assert_eq!(convert(Dbl, U8, -2.0), 0.0);
        assert_eq!(convert(Flt, Dbl, 0.25), 0.25);
    }

    #[test]
    fn test_remix_between() {
        assert_eq!(
            Remix::between(ChannelLayout::STEREO, ChannelLayout::STEREO),
            Some(Remix::Identity)
        );
        assert_eq!(
            Remix::between(ChannelLayout::STEREO, ChannelLayout::MONO),
            Some(Remix::StereoToMono)
        );
        assert_eq!(Remix::between(ChannelLayout::LAYOUT_5_1, ChannelLayout::MONO), None);
    }

    #[test]
    fn test_remix_surround_center() {
        let mut out = Vec::new();
        Remix::StereoToSurround51.apply(&[101.0, -7.0], SampleFormat::S16, &mut out);
        assert_eq!(out, vec![101.0, -7.0, 47.0, 0.0, 0.0, 0.0]);
        out.clear();
        Remix::StereoToSurround51.apply(&[10.0, 20.0], SampleFormat::U8, &mut out);
        assert_eq!(out[3..], [128.0, 128.0, 128.0]);
    }

    #[test]
    fn test_stereo_downmix() {
        let (mut graph, src, sink) = chain("s16:stereo:48000", Some("s16:mono"));
        let data = s16_bytes(&[100, 200, 300, 400, 500, 600, 700, 800]);
        add_samples(&mut graph, src, &data, false, Some(3)).unwrap();

        let out = pull_samples(&mut graph, sink).unwrap();
        assert_eq!(s16_values(&out), vec![150, 350, 550, 750]);
        let props = out.audio().unwrap();
        assert_eq!(props.channel_layout, ChannelLayout::MONO);
        assert_eq!(props.sample_rate, 48000);
        assert_eq!(out.pts, Some(3));
    }

    #[test]
    fn test_mono_to_stereo_from_planar_u8() {
        let (mut graph, src, sink) = chain("u8:mono", Some("s16:stereo"));
        add_samples(&mut graph, src, &[0x80, 0x81, 0x7f], true, None).unwrap();

        let out = pull_samples(&mut graph, sink).unwrap();
        assert_eq!(s16_values(&out), vec![0, 0, 256, 256, -256, -256]);
        assert!(!out.audio().unwrap().planar);
    }

    #[test]
    fn test_keep_fields() {
        let (mut graph, src, sink) = chain("s32:stereo", Some("auto:-1"));
        let data: Vec<u8> = [1i32, -1].iter().flat_map(|v| v.to_ne_bytes()).collect();
        add_samples(&mut graph, src, &data, false, None).unwrap();
        let out = pull_samples(&mut graph, sink).unwrap();
        assert_eq!(out.format(), Format::Sample(SampleFormat::S32));
        assert_eq!(out.audio().unwrap().channel_layout, ChannelLayout::STEREO);
    }

    #[test]
    fn test_invalid_args() {
        let mut graph = FilterGraph::new();
        let conv = graph.open_by_name("resample", None).unwrap();
        assert!(graph.init_filter(conv, Some("s24"), None).is_err());
        assert!(graph.init_filter(conv, Some("s16:nonsense"), None).is_err());
        assert!(graph.init_filter(conv, Some("s16:0"), None).is_err());
    }

    #[test]
    fn test_unsupported_remix_fails_config() {
        let mut graph = FilterGraph::new();
        let src = graph.open_by_name("abuffer", None).unwrap();
        graph.init_filter(src, Some("s16:5.1"), None).unwrap();
        let conv = graph.open_by_name("resample", None).unwrap();
        graph.init_filter(conv, Some("-1:mono"), None).unwrap();
        let sink = graph.open_by_name("abuffersink", None).unwrap();
        graph.link(src, 0, conv, 0).unwrap();
        graph.link(conv, 0, sink, 0).unwrap();
        assert!(matches!(graph.configure(), Err(Error::LinkConfig { .. })));
    }
}
