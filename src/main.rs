mod error;
mod gb;

use crate::gb::{Button, Console, SCREEN_HEIGHT, SCREEN_WIDTH};
use clap::Parser;
use eframe::egui;
use egui::{CentralPanel, Color32, ColorImage, Key, TextureHandle, TextureOptions, Vec2};
use std::path::PathBuf;

/// Experimental DMG emulator.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path of the ROM to load.
    rom: PathBuf,

    /// Use the classic green-tinted DMG palette instead of grayscale.
    #[arg(long)]
    green: bool,

    /// Disable audio output.
    #[arg(long)]
    mute: bool,

    /// Window upscale factor.
    #[arg(long, default_value_t = 3)]
    scale: usize,
}

const KEY_MAP: [(Key, Button); 8] = [
    (Key::ArrowUp, Button::Up),
    (Key::ArrowDown, Button::Down),
    (Key::ArrowLeft, Button::Left),
    (Key::ArrowRight, Button::Right),
    (Key::Z, Button::A),
    (Key::X, Button::B),
    (Key::Enter, Button::Start),
    (Key::Backspace, Button::Select),
];

struct Romoulade {
    console: Console,
    scale: usize,
    texture: Option<TextureHandle>,
}

impl Romoulade {
    fn new(console: Console, scale: usize) -> Self {
        Self {
            console,
            scale,
            texture: None,
        }
    }

    fn handle_input(&mut self, ctx: &egui::Context) {
        ctx.input(|input| {
            for (key, button) in KEY_MAP {
                self.console.set_button(button, input.key_down(key));
            }
        });
    }

    fn draw_frame(&mut self, ctx: &egui::Context) {
        let pixels: Vec<Color32> = self
            .console
            .framebuffer()
            .iter()
            .map(|&argb| {
                let [a, r, g, b] = argb.to_be_bytes();
                Color32::from_rgba_premultiplied(r, g, b, a)
            })
            .collect();
        let image = ColorImage {
            size: [SCREEN_WIDTH, SCREEN_HEIGHT],
            pixels,
        };
        match &mut self.texture {
            Some(texture) => texture.set(image, TextureOptions::NEAREST),
            None => self.texture = Some(ctx.load_texture("frame", image, TextureOptions::NEAREST)),
        }
    }
}

impl eframe::App for Romoulade {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_input(ctx);
        self.console.step();
        self.draw_frame(ctx);

        CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.texture {
                let size = Vec2::new(
                    (SCREEN_WIDTH * self.scale) as f32,
                    (SCREEN_HEIGHT * self.scale) as f32,
                );
                ui.image((texture.id(), size));
            }
        });
        ctx.request_repaint();
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut console = Console::new();
    if !console.load_cartridge(&args.rom) {
        std::process::exit(1);
    }
    println!("Loaded {}", console.cartridge_info());

    console.set_classic_green(args.green);
    console.set_audio_enabled(!args.mute);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size(Vec2::new(
            (SCREEN_WIDTH * args.scale) as f32,
            (SCREEN_HEIGHT * args.scale) as f32,
        )),
        ..Default::default()
    };

    eframe::run_native(
        "romoulade",
        options,
        Box::new(|_cc| Ok(Box::new(Romoulade::new(console, args.scale)))),
    )
}
