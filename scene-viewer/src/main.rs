use anyhow::Context;
use log::LevelFilter;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use winit::event::{
    DeviceEvent, ElementState, Event, KeyboardInput, MouseScrollDelta, StartCause,
    VirtualKeyCode, WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{CursorGrabMode, WindowBuilder};

mod bounds;
mod camera;
mod collision;
mod face;
mod gpumesh;
mod group;
mod material;
mod mesh;
mod objparse;
mod projectile;
mod render;
mod scene;
mod texture;

use collision::Collision;
use projectile::Projectile;
use render::Renderable;

const DEFAULT_CONFIG: &str = "scene.cfg";
const LOG_ENV: &str = "SCENE_VIEWER_LOG";

// true only on the press that flips `down`, so key repeat doesn't retrigger
fn pressed_once(down: &mut bool, state: ElementState) -> bool {
    let was_down = *down;
    *down = state == ElementState::Pressed;
    *down && !was_down
}

fn main() -> anyhow::Result<()> {
    let level = std::env::var(LOG_ENV)
        .ok()
        .and_then(|l| l.parse().ok())
        .unwrap_or(LevelFilter::Info);
    simple_logger::SimpleLogger::new().with_level(level).init()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let scene = scene::load_scene(&config_path)
        .with_context(|| format!("couldn't load the scene from {}", config_path.display()))?;
    let mut textures = texture::TextureCache::default();
    let mut objects = scene::load_objects(&scene, &mut textures);

    let event_loop = EventLoop::new();
    let window = WindowBuilder::new()
        .with_title("Scene Viewer")
        .with_resizable(true)
        .build(&event_loop)?;
    if let Err(e) = window
        .set_cursor_grab(CursorGrabMode::Confined)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
    {
        log::warn!("Couldn't grab the cursor: {}", e);
    }
    window.set_cursor_visible(false);

    let mut render_state = render::RenderState::create(&window)?;
    render_state.upload_textures(&textures);
    // everything is on the gpu now
    textures.clear();
    let mut gpu_meshes = objects
        .iter()
        .map(|o| (o.id, render_state.upload_mesh(&o.mesh)))
        .collect::<HashMap<_, _>>();

    let mut camera = camera::Camera3D::new(scene.camera_position);
    let mut controller = camera::SimpleCamera3DController::create();
    let mut fog = scene.fog;
    render_state.set_environment(&scene.light, &scene.attenuation, &fog);

    let mut projectiles: Vec<Projectile> = vec![];
    let mut space_down = false;
    let mut f_down = false;
    let mut last_frame = Instant::now();

    // 60 fps
    const DUR: Duration = Duration::from_micros(16667);

    event_loop.run(move |event, _eloop, control_flow| match event {
        Event::NewEvents(StartCause::Init) => {
            *control_flow = ControlFlow::WaitUntil(Instant::now() + DUR)
        }
        // per-frame actions
        Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {
            *control_flow = ControlFlow::WaitUntil(Instant::now() + DUR);
            let now = Instant::now();
            let dt = (now - last_frame).as_secs_f32();
            last_frame = now;

            controller.camera_update(&mut camera, dt);

            for p in projectiles.iter_mut() {
                p.update(dt);
            }
            projectiles.retain(Projectile::is_active);

            let collisions = collision::check_collisions(&mut projectiles, &mut objects, dt);
            if collisions
                .iter()
                .any(|c| matches!(c, Collision::Eliminated { .. }))
            {
                gpu_meshes.retain(|id, _| objects.iter().any(|o| o.id == *id));
                log::info!("{} object(s) left", objects.len());
            }

            render_state.update_camera(&camera);
            let renderables = objects
                .iter()
                .filter_map(|o| {
                    gpu_meshes.get(&o.id).map(|mesh| Renderable::SceneMesh {
                        mesh,
                        transform: o.matrix(),
                    })
                })
                .chain(
                    projectiles
                        .iter()
                        .filter(|p| p.is_active())
                        .map(|p| Renderable::Projectile { position: p.position }),
                )
                .collect::<Vec<_>>();
            if let Err(e) = render_state.render(&renderables) {
                log::error!("{:#}", e);
                *control_flow = ControlFlow::Exit;
            }
        }
        Event::DeviceEvent {
            event: DeviceEvent::MouseMotion { delta: (dx, dy) },
            ..
        } => camera.look(dx as f32, dy as f32),
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => *control_flow = ControlFlow::Exit,
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state,
                        virtual_keycode,
                        ..
                    },
                ..
            } => {
                if let Some(code) = virtual_keycode {
                    controller.input(state, code);
                    match code {
                        VirtualKeyCode::Escape => *control_flow = ControlFlow::Exit,
                        VirtualKeyCode::Space => {
                            if pressed_once(&mut space_down, state) {
                                projectiles.push(Projectile::fired_from(
                                    camera.position,
                                    camera.front(),
                                ));
                                log::debug!("Fired, {} projectile(s) in flight", projectiles.len());
                            }
                        }
                        VirtualKeyCode::F => {
                            if pressed_once(&mut f_down, state) {
                                fog.enabled = !fog.enabled;
                                render_state.set_environment(
                                    &scene.light,
                                    &scene.attenuation,
                                    &fog,
                                );
                                log::info!("Fog {}", if fog.enabled { "on" } else { "off" });
                            }
                        }
                        _ => {}
                    }
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / 20.0,
                };
                camera.scroll(amount);
            }
            WindowEvent::Resized(size) => {
                log::debug!("Resizing to {:?}", size);
                render_state.resize(size.into());
            }
            _ => {}
        },
        Event::LoopDestroyed => {
            log::info!("Closing time!");
        }
        _ => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_trigger_once() {
        let mut down = false;
        assert!(pressed_once(&mut down, ElementState::Pressed));
        // key repeat
        assert!(!pressed_once(&mut down, ElementState::Pressed));
        assert!(!pressed_once(&mut down, ElementState::Released));
        assert!(pressed_once(&mut down, ElementState::Pressed));
    }
}
