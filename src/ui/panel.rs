/// Filter control panel
///
/// One group per filter: an enable checkbox, plus the filter's controls
/// while it is the active one.

use iced::widget::{checkbox, column, pick_list, slider, text, Column};
use iced::Element;

use filter_viewer::kernel::{EdgeAlgorithm, KernelSize};
use filter_viewer::state::filter::{FilterKind, FilterParams, FilterSelector, ParamUpdate, MAX_SCALE_FACTOR};

use crate::Message;

/// Deviation slider bounds
const DEVIATION_RANGE: std::ops::RangeInclusive<f32> = 0.5..=5.0;

/// Bilateral range slider bounds
const RANGE_RANGE: std::ops::RangeInclusive<f32> = 0.1..=1.0;

const SLIDER_STEP: f32 = 0.1;

/// Build the whole panel from the current selection
pub fn filter_panel(selector: &FilterSelector) -> Element<'static, Message> {
    let groups = FilterKind::ALL
        .iter()
        .map(|&kind| filter_group(kind, selector.is_active(kind), selector.params(kind)));

    Column::with_children(groups).spacing(16).into()
}

fn filter_group(kind: FilterKind, active: bool, params: FilterParams) -> Element<'static, Message> {
    let toggle = checkbox(kind.label(), active).on_toggle(move |enabled| Message::ToggleFilter(kind, enabled));

    let mut group = column![toggle].spacing(6);
    if active {
        group = group.push(controls(params));
    }
    group.into()
}

fn controls(params: FilterParams) -> Element<'static, Message> {
    match params {
        FilterParams::Blur(p) => column![
            kernel_size_slider(p.kernel_size),
            deviation_slider(p.deviation),
        ]
        .spacing(6)
        .into(),
        FilterParams::Bilateral(p) => column![
            kernel_size_slider(p.kernel_size),
            deviation_slider(p.deviation),
            labelled(
                format!("Range: {:.1}", p.range),
                slider(RANGE_RANGE, p.range, |v| Message::Parameter(ParamUpdate::Range(v)))
                    .step(SLIDER_STEP)
                    .on_release(Message::PersistSettings)
                    .into(),
            ),
        ]
        .spacing(6)
        .into(),
        FilterParams::Sharpen(p) => labelled(
            format!("Scale factor: {:.1}", p.scale_factor),
            slider(0.0..=MAX_SCALE_FACTOR, p.scale_factor, |v| {
                Message::Parameter(ParamUpdate::ScaleFactor(v))
            })
            .step(SLIDER_STEP)
            .on_release(Message::PersistSettings)
            .into(),
        ),
        FilterParams::Edge(p) => labelled(
            "Algorithm".to_string(),
            pick_list(EdgeAlgorithm::ALL, Some(p.algorithm), |a| {
                Message::Parameter(ParamUpdate::EdgeAlgorithm(a))
            })
            .into(),
        ),
    }
}

fn kernel_size_slider(size: KernelSize) -> Element<'static, Message> {
    labelled(
        format!("Kernel size: {size}"),
        slider(0..=3u8, size.slider_index(), |index| {
            // the slider bounds keep the index valid
            let size = KernelSize::from_slider_index(index).unwrap_or_default();
            Message::Parameter(ParamUpdate::KernelSize(size))
        })
        .on_release(Message::PersistSettings)
        .into(),
    )
}

fn deviation_slider(deviation: f32) -> Element<'static, Message> {
    labelled(
        format!("Deviation: {:.1}", deviation),
        slider(DEVIATION_RANGE, deviation, |v| Message::Parameter(ParamUpdate::Deviation(v)))
            .step(SLIDER_STEP)
            .on_release(Message::PersistSettings)
            .into(),
    )
}

fn labelled(label: String, control: Element<'static, Message>) -> Element<'static, Message> {
    column![text(label).size(14), control].spacing(4).into()
}
