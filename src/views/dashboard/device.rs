use crate::common::{DeviceSnapshot, GpuInfo};
use crate::state::StateMirror;
use crate::utils::{format_bytes, format_gigabytes};
use ratatui::{
    style::{Color, Stylize},
    text::{Line, Span},
};

const BAR_WIDTH: usize = 20;

/// Lines of the device panel: host, CPU, RAM and one entry per GPU.
pub fn build_device_lines(state: &StateMirror) -> Vec<Line<'static>> {
    let Some(device) = state.device() else {
        return vec![Line::from("Device information not available yet").dark_gray()];
    };

    let mut lines = vec![
        Line::from(vec![
            Span::from("Host: ").bold(),
            Span::from(format!("{} ({} {})", device.hostname, device.os, device.os_version)),
        ]),
        Line::from(vec![
            Span::from("CPU:  ").bold(),
            Span::from(format!("{} ({} threads)", device.cpu_name, device.cpu_threads)),
        ]),
        ram_line(device),
    ];

    if device.has_gpus() {
        lines.extend(device.gpus.iter().map(gpu_line));
    } else {
        lines.push(Line::from(vec![
            Span::from("GPU:  ").bold(),
            Span::from("no GPU found").dark_gray(),
        ]));
    }

    lines.push(Line::from(vec![
        Span::from("Logs: ").bold(),
        Span::from(format_bytes(device.log_file_size, 1)),
    ]));
    lines
}

fn ram_line(device: &DeviceSnapshot) -> Line<'static> {
    let percent = device.ram_usage_percent();
    Line::from(vec![
        Span::from("RAM:  ").bold(),
        usage_bar(percent),
        Span::from(format!(
            " {}% of {}",
            percent,
            format_gigabytes(device.ram_installed, 1)
        )),
    ])
}

fn gpu_line(gpu: &GpuInfo) -> Line<'static> {
    let percent = gpu.usage_percent();
    let mut spans = vec![
        Span::from("GPU:  ").bold(),
        usage_bar(percent),
        Span::from(format!(
            " {}% of {} {}",
            percent,
            format_gigabytes(gpu.memory_total, 1),
            gpu.name
        )),
    ];
    if let Some(celsius) = gpu.temperature {
        spans.push(Span::from(" "));
        spans.push(temperature_badge(celsius));
    }
    Line::from(spans)
}

/// Text gauge such as `[#####---------------]`, colored by load.
pub fn usage_bar(percent: u16) -> Span<'static> {
    let filled = (percent.min(100) as usize * BAR_WIDTH).div_ceil(100);
    let text = format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let color = match percent {
        p if p >= 90 => Color::Red,
        p if p >= 70 => Color::Yellow,
        _ => Color::Green,
    };
    Span::from(text).fg(color)
}

pub fn temperature_color(celsius: f64) -> Color {
    if celsius >= 80.0 {
        Color::Red
    } else if celsius >= 60.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn temperature_badge(celsius: f64) -> Span<'static> {
    Span::from(format!("{:.0}°C", celsius)).fg(temperature_color(celsius))
}
