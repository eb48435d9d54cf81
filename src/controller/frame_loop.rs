use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, error, info, warn};

use crate::assets::{AssetLoader, DecodeBackend, LoadFailure, LoadTicket, ReadyAsset, VideoStream};
use crate::config::SceneConfig;
use crate::error::AssetError;
use crate::model::{
    AnimatedLight, AssetRequest, AudioRequest, Camera, Light, LoadedAsset, MaterialBinding, SceneContext,
};
use crate::view::{Frame, FrameStats, RenderBackend};

use super::input::InputState;
use super::light_animator::LightAnimator;
use super::media::MediaController;
use super::navigator::Navigator;
use super::video_mapper::VideoSurfaceMapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, never ticked.
    Idle,
    Running,
}

/// Tick counter plus an fps readout for the HUD.
///
/// Nothing that moves or flickers reads from here.
#[derive(Debug, Default)]
pub struct FrameClock {
    ticks: u64,
    fps: f32,
    window_start: Option<f64>,
    window_frames: u32,
}

impl FrameClock {
    pub fn tick(&mut self, now_ms: f64) {
        self.ticks += 1;
        self.window_frames += 1;
        let start = *self.window_start.get_or_insert(now_ms);
        let elapsed = now_ms - start;
        if elapsed >= 1000.0 {
            self.fps = (self.window_frames as f64 * 1000.0 / elapsed) as f32;
            self.window_frames = 0;
            self.window_start = Some(now_ms);
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

/// Main loop state and per-tick update logic.
///
/// One `tick` per display refresh, in this order: mouse look and movement,
/// splice in whatever finished loading, settle video mappings, media
/// bookkeeping, light flicker, then a single render. Loads never block a
/// tick and no failure escapes one.
pub struct FrameLoop<R: RenderBackend> {
    scene: SceneContext,
    camera: Camera,
    input: Rc<RefCell<InputState>>,
    navigator: Navigator,
    animator: LightAnimator,
    loader: AssetLoader,
    media: MediaController,
    /// Streams opened at request time, waiting for their model.
    videos: HashMap<LoadTicket, Rc<dyn VideoStream>>,
    renderer: R,
    clock: FrameClock,
    state: LoopState,
}

impl<R: RenderBackend> FrameLoop<R> {
    pub fn new(
        scene: SceneContext,
        camera: Camera,
        navigator: Navigator,
        animator: LightAnimator,
        backend: Rc<dyn DecodeBackend>,
        renderer: R,
    ) -> Self {
        Self {
            scene,
            camera,
            input: Rc::new(RefCell::new(InputState::default())),
            navigator,
            animator,
            loader: AssetLoader::new(backend),
            media: MediaController::new(),
            videos: HashMap::new(),
            renderer,
            clock: FrameClock::default(),
            state: LoopState::Idle,
        }
    }

    /// Builds the loop for a configured scene and issues every load.
    pub fn from_config(
        config: &SceneConfig,
        backend: Rc<dyn DecodeBackend>,
        renderer: R,
        width: u32,
        height: u32,
    ) -> Self {
        let mut scene = SceneContext::new(config.atmosphere.to_atmosphere());
        for light in &config.lights {
            scene.add_light(light.to_light());
        }

        let mut camera = Camera::new(width, height);
        camera.eye = config.camera.position;
        camera.fov_y = config.camera.fov_deg.to_radians();
        camera.z_near = config.camera.near;
        camera.z_far = config.camera.far;
        if let Some(target) = config.camera.look_at {
            camera.set_look_at(target);
        }

        let mut frame_loop = Self::new(
            scene,
            camera,
            Navigator::new(config.move_speed, config.look_sensitivity),
            LightAnimator::new(f64::from(config.flicker.step), f64::from(config.flicker.phase_range)),
            backend,
            renderer,
        );
        for request in config.requests() {
            frame_loop.request(request);
        }
        if let Some(audio) = &config.audio {
            frame_loop.request_audio(audio.clone());
        }
        frame_loop
    }

    /// Issues a model load. A video surface starts streaming right away so
    /// it is already playing when its frame pops in.
    pub fn request(&mut self, request: AssetRequest) -> LoadTicket {
        let video = request.video_surface().map(|s| (s.video.clone(), s.unmute_volume));
        let name = request.name.clone();
        let ticket = self.loader.load(request);

        if let Some((locator, unmute_volume)) = video {
            match self.loader.open_video(&locator) {
                Ok(stream) => {
                    self.media.add_video(stream.clone(), unmute_volume);
                    self.videos.insert(ticket, stream);
                }
                Err(error) => self.loader.report(LoadFailure { ticket, name, error }),
            }
        }
        ticket
    }

    pub fn request_audio(&mut self, request: AudioRequest) -> LoadTicket {
        self.loader.load_audio(request)
    }

    pub fn tick(&mut self, now_ms: f64) {
        if self.state == LoopState::Idle {
            info!("Frame loop running");
            self.state = LoopState::Running;
        }
        self.clock.tick(now_ms);

        // Look and move
        let (engaged, interacted) = {
            let mut input = self.input.borrow_mut();
            let (dx, dy) = input.consume_look();
            if input.engaged() {
                self.navigator.apply_look(&mut self.camera, dx, dy);
            }
            let displacement = self.navigator.step(&input, input.engaged());
            self.navigator.apply(&mut self.camera, displacement);
            (input.engaged(), input.take_interaction())
        };
        if interacted {
            self.media.on_interaction();
        }

        // Splice finished loads between input and render
        self.loader.pump();
        let ready: Vec<ReadyAsset> = self.loader.drain_ready().collect();
        for asset in ready {
            self.splice(asset);
        }
        let audio: Vec<_> = self.loader.drain_ready_audio().collect();
        for ready in audio {
            self.media.add_audio(ready.track, ready.request.volume, ready.request.looped);
        }
        let failures = self.loader.failures();
        self.videos.retain(|ticket, _| !failures.iter().any(|f| f.ticket == *ticket));

        VideoSurfaceMapper::resolve_pending(&mut self.scene, &mut self.renderer);
        self.media.poll();

        // Flicker
        let animator = &self.animator;
        self.scene.update_animated(|light| animator.tick(light));

        let frame = Frame {
            scene: &self.scene,
            camera: &self.camera,
            engaged,
            stats: self.stats(),
        };
        if let Err(e) = self.renderer.render(&frame) {
            error!("Render failed: {e}");
        }
    }

    fn splice(&mut self, ready: ReadyAsset) {
        let ReadyAsset { ticket, request, mut mesh } = ready;

        if let Some(MaterialBinding::Glow(rule)) = &request.binding {
            let glowing = mesh.apply_glow(&rule.node_contains, rule.emissive());
            debug!("{}: {glowing} primitive(s) glow", request.name);
        }

        let node = self.scene.allocate_node();
        let world = request.transform.matrix();
        if let Err(e) = self.renderer.insert_node(node, &mesh, world) {
            let error = AssetError::Decode { locator: request.locator.clone(), reason: e.to_string() };
            self.videos.remove(&ticket);
            self.loader.report(LoadFailure { ticket, name: request.name.clone(), error });
            return;
        }

        if let Some(attached) = &request.light {
            let position = request.transform.position + attached.offset;
            let id = self.scene.add_light(Light::point(
                attached.color,
                attached.base_intensity,
                position,
                attached.distance,
                attached.decay,
            ));
            let phase = self.animator.random_phase(&mut rand::thread_rng());
            self.scene
                .register_animated(AnimatedLight::new(id, attached.base_intensity, attached.amplitude, phase));
        }

        match (request.video_surface(), self.videos.remove(&ticket)) {
            (Some(surface), Some(stream)) => {
                self.scene.bind_video(node, surface.clone(), stream);
            }
            (Some(surface), None) => warn!("{}: video {} never opened", request.name, surface.video),
            _ => {}
        }

        let materials = mesh.material_names();
        self.scene.insert_asset(LoadedAsset { node, request, world, materials });
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.camera.set_aspect(width, height);
        self.renderer.resize(width, height);
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            tick: self.clock.ticks(),
            fps: self.clock.fps(),
            loaded: self.scene.assets().len(),
            pending: self.loader.pending_count(),
            failed: self.loader.failures().len(),
        }
    }

    /// Shared handle for event listeners.
    pub fn input(&self) -> Rc<RefCell<InputState>> {
        self.input.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn media(&self) -> &MediaController {
        &self.media
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use glam::Vec3;

    use super::*;
    use crate::assets::loader::testing::{quad, FakeMedia, Script, ScriptedBackend};
    use crate::controller::input::Action;
    use crate::controller::media::PlaybackState;
    use crate::model::{AttachedLight, Atmosphere, Color, GlowRule, MappingState, Transform, VideoSurface};
    use crate::view::testing::RecordingBackend;

    fn frame_loop(backend: ScriptedBackend) -> FrameLoop<RecordingBackend> {
        FrameLoop::new(
            SceneContext::new(Atmosphere::default()),
            Camera::new(800, 600),
            Navigator::new(0.2, 0.002),
            LightAnimator::new(0.05, 100.0),
            Rc::new(backend),
            RecordingBackend::default(),
        )
    }

    fn run(frame_loop: &mut FrameLoop<RecordingBackend>, ticks: usize) {
        for _ in 0..ticks {
            let now = frame_loop.stats().tick as f64 * 16.0;
            frame_loop.tick(now);
        }
    }

    fn placed() -> Transform {
        Transform {
            position: Vec3::new(0.3, 6.0, 1.0),
            rotation: Some(Vec3::new(0.0, -0.15, 0.0)),
            scale: Vec3::splat(0.7),
        }
    }

    fn video_surface() -> VideoSurface {
        VideoSurface {
            video: "/videos/klcc.mp4".to_string(),
            material: "Material.001".to_string(),
            zoom: 1.7,
            offset: glam::Vec2::ZERO,
            surface_aspect: 0.24,
            centering: 0.9,
            unmute_volume: 0.01,
        }
    }

    #[test]
    fn starts_idle_and_runs_after_first_tick() {
        let mut fl = frame_loop(ScriptedBackend::default());
        assert_eq!(fl.state(), LoopState::Idle);
        fl.tick(0.0);
        assert_eq!(fl.state(), LoopState::Running);
        assert_eq!(fl.renderer().renders, 1);
    }

    #[test]
    fn engaged_without_keys_does_not_drift() {
        let mut fl = frame_loop(ScriptedBackend::default());
        fl.input().borrow_mut().set_engaged(true);
        let start = fl.camera().eye;
        run(&mut fl, 10);
        assert_eq!(fl.camera().eye, start);
        assert_eq!(fl.renderer().renders, 10);
    }

    #[test]
    fn held_forward_moves_a_fixed_step_per_tick() {
        let mut fl = frame_loop(ScriptedBackend::default());
        {
            let input = fl.input();
            let mut input = input.borrow_mut();
            input.set_engaged(true);
            input.set_pressed(Action::Forward, true);
        }
        run(&mut fl, 10);
        assert!((fl.camera().eye.length() - 2.0).abs() < 1e-4);

        fl.input().borrow_mut().set_engaged(false);
        let parked = fl.camera().eye;
        run(&mut fl, 5);
        assert_eq!(fl.camera().eye, parked);
    }

    #[test]
    fn loaded_asset_is_inserted_once_with_its_transform() {
        let backend = ScriptedBackend::default().with_mesh("/models/frame2.glb", Script::Ready(quad("Frame")));
        let mut fl = frame_loop(backend);
        fl.request(AssetRequest::new("framez", "/models/frame2.glb", placed()));

        run(&mut fl, 5);

        let inserted = &fl.renderer().inserted;
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].world, placed().matrix());
        assert_eq!(fl.scene().assets().len(), 1);
        assert_eq!(fl.scene().assets()[0].node, inserted[0].node);
        assert_eq!(fl.scene().assets()[0].world, placed().matrix());
    }

    #[test]
    fn slow_loads_pop_in_later_without_stalling() {
        let gate = Rc::new(Cell::new(false));
        let backend =
            ScriptedBackend::default().with_mesh("/models/thearc.glb", Script::Gate(gate.clone(), quad("Wall")));
        let mut fl = frame_loop(backend);
        fl.request(AssetRequest::new("thearc", "/models/thearc.glb", Transform::default()));

        run(&mut fl, 3);
        assert_eq!(fl.renderer().renders, 3);
        assert!(fl.scene().assets().is_empty());
        assert_eq!(fl.stats().pending, 1);

        gate.set(true);
        run(&mut fl, 1);
        assert_eq!(fl.scene().assets().len(), 1);
        assert_eq!(fl.stats().pending, 0);
    }

    #[test]
    fn failed_load_leaves_no_node_and_the_loop_keeps_going() {
        let mut fl = frame_loop(ScriptedBackend::default());
        fl.request(AssetRequest::new("ghost", "/models/missing.glb", Transform::default()));

        run(&mut fl, 30);

        assert_eq!(fl.renderer().renders, 30);
        assert!(fl.renderer().inserted.is_empty());
        assert!(fl.scene().assets().is_empty());
        assert_eq!(fl.stats().failed, 1);
    }

    #[test]
    fn render_errors_do_not_stop_the_loop() {
        let mut fl = frame_loop(ScriptedBackend::default());
        fl.renderer_mut().fail_renders = true;
        run(&mut fl, 4);
        assert_eq!(fl.renderer().renders, 4);
    }

    #[test]
    fn video_mapping_waits_for_the_first_frame() {
        let video = FakeMedia::new("/videos/klcc.mp4");
        let backend = ScriptedBackend::default()
            .with_mesh("/models/frame2.glb", Script::Ready(quad("Material.001")))
            .with_video("/videos/klcc.mp4", video.clone());
        let mut fl = frame_loop(backend);
        let mut request = AssetRequest::new("frame-klcc", "/models/frame2.glb", placed());
        request.binding = Some(MaterialBinding::Video(video_surface()));
        fl.request(request);

        run(&mut fl, 3);
        assert_eq!(fl.scene().videos().len(), 1);
        assert_eq!(fl.scene().videos()[0].mapping, MappingState::Deferred);
        assert!(fl.renderer().video_materials.is_empty());

        video.size.set(Some((1920, 1080)));
        run(&mut fl, 3);
        let applied = &fl.renderer().video_materials;
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].1, "Material.001");
        let uv = applied[0].3;
        assert!((uv.repeat.y - 0.2295).abs() < 1e-4);
        assert!(matches!(fl.scene().videos()[0].mapping, MappingState::Applied(_)));
    }

    #[test]
    fn videos_start_muted_and_unmute_on_first_click() {
        let video = FakeMedia::new("/videos/funnyVid.mp4");
        let backend = ScriptedBackend::default().with_video("/videos/funnyVid.mp4", video.clone());
        let mut fl = frame_loop(backend);
        let mut request = AssetRequest::new("frame-funny", "/models/missing.glb", Transform::default());
        let mut surface = video_surface();
        surface.video = "/videos/funnyVid.mp4".to_string();
        request.binding = Some(MaterialBinding::Video(surface));
        fl.request(request);

        run(&mut fl, 1);
        assert!(video.muted.get());
        assert_eq!(video.play_calls.get(), 1);

        fl.input().borrow_mut().process_event(&crate::controller::input::InputEvent::MouseClick);
        run(&mut fl, 1);
        assert!(!video.muted.get());
        assert_eq!(video.volume.get(), 0.01);
    }

    #[test]
    fn unopenable_video_is_a_load_failure_but_the_frame_still_loads() {
        let backend = ScriptedBackend::default().with_mesh("/models/frame2.glb", Script::Ready(quad("Material.001")));
        let mut fl = frame_loop(backend);
        let mut request = AssetRequest::new("frame-klcc", "/models/frame2.glb", placed());
        request.binding = Some(MaterialBinding::Video(video_surface()));
        fl.request(request);

        run(&mut fl, 2);
        assert_eq!(fl.stats().failed, 1);
        assert_eq!(fl.scene().assets().len(), 1);
        assert!(fl.scene().videos().is_empty());
    }

    #[test]
    fn candle_brings_a_flickering_light_and_a_glowing_flame() {
        let mut mesh = quad("wax");
        mesh.primitives[0].node_name = Some("flame_mesh".to_string());
        let backend = ScriptedBackend::default().with_mesh("/models/scented_candle.glb", Script::Ready(mesh));
        let mut fl = frame_loop(backend);

        let mut request = AssetRequest::new(
            "candle",
            "/models/scented_candle.glb",
            Transform { position: Vec3::new(-1.0, 6.3, 2.0), rotation: None, scale: Vec3::splat(3.0) },
        );
        request.binding = Some(MaterialBinding::Glow(GlowRule {
            node_contains: "flame".to_string(),
            color: Color::from_hex(0xff9933),
            strength: 2.0,
        }));
        request.light = Some(AttachedLight {
            color: Color::from_hex(0xff9933),
            offset: Vec3::new(0.0, 2.0, 0.0),
            distance: 10.0,
            decay: 3.0,
            base_intensity: 100.0,
            amplitude: 20.0,
        });
        fl.request(request);

        run(&mut fl, 1);
        assert_eq!(fl.scene().animated().len(), 1);
        let anim = &fl.scene().animated()[0];
        let light = fl.scene().light(anim.light).unwrap();
        match light.kind {
            crate::model::LightKind::Point { position, distance, decay } => {
                assert!((position - Vec3::new(-1.0, 8.3, 2.0)).length() < 1e-5);
                assert_eq!((distance, decay), (10.0, 3.0));
            }
            other => panic!("expected a point light, got {other:?}"),
        }
        assert_ne!(fl.renderer().inserted[0].mesh.primitives[0].material.emissive, [0.0; 3]);

        let mut seen = Vec::new();
        for _ in 0..20 {
            run(&mut fl, 1);
            let anim = &fl.scene().animated()[0];
            seen.push(fl.scene().light(anim.light).unwrap().intensity);
        }
        assert!(seen.iter().all(|i| (80.0..=120.0).contains(i)));
        assert!(seen.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn failed_candle_adds_no_light() {
        let mut fl = frame_loop(ScriptedBackend::default());
        let mut request = AssetRequest::new("candle", "/models/scented_candle.glb", Transform::default());
        request.light = Some(AttachedLight {
            color: Color::WHITE,
            offset: Vec3::ZERO,
            distance: 10.0,
            decay: 3.0,
            base_intensity: 100.0,
            amplitude: 20.0,
        });
        fl.request(request);
        run(&mut fl, 5);
        assert!(fl.scene().animated().is_empty());
        assert_eq!(fl.scene().lights().count(), 0);
    }

    #[test]
    fn blocked_audio_retries_on_interaction() {
        let track = FakeMedia::new("/audio/about_you.m4a");
        track.play_results.replace(vec![Err(FakeMedia::blocked("bgm"))]);
        let backend = ScriptedBackend::default().with_audio("/audio/about_you.m4a", track.clone());
        let mut fl = frame_loop(backend);
        fl.request_audio(AudioRequest { path: "/audio/about_you.m4a".to_string(), volume: 0.2, looped: true });

        run(&mut fl, 2);
        let state = |fl: &FrameLoop<RecordingBackend>| fl.media().states().next().map(|(_, s)| s);
        assert_eq!(state(&fl), Some(PlaybackState::Blocked));

        fl.input()
            .borrow_mut()
            .process_event(&crate::controller::input::InputEvent::KeyDown("w".to_string()));
        run(&mut fl, 1);
        assert_eq!(state(&fl), Some(PlaybackState::Playing));
    }

    #[test]
    fn resize_updates_camera_and_backend() {
        let mut fl = frame_loop(ScriptedBackend::default());
        fl.resize(1920, 1080);
        fl.resize(0, 0);
        assert!((fl.camera().aspect - 1920.0 / 1080.0).abs() < 1e-6);
        assert_eq!(fl.renderer().sizes, vec![(1920, 1080)]);
    }

    #[test]
    fn configured_scene_registers_static_lights_and_issues_loads() {
        let config = SceneConfig::embedded().unwrap();
        let fl = FrameLoop::from_config(&config, Rc::new(ScriptedBackend::default()), RecordingBackend::default(), 800, 600);
        assert_eq!(fl.scene().lights().count(), 4);
        assert_eq!(fl.camera().eye, Vec3::new(1.53, 8.8, 5.22));
        // seven models plus the ambient track
        assert_eq!(fl.stats().pending, 8);
    }

    #[test]
    fn fps_is_measured_over_one_second_windows() {
        let mut clock = FrameClock::default();
        for i in 0..=60 {
            clock.tick(i as f64 * 1000.0 / 60.0);
        }
        assert_eq!(clock.ticks(), 61);
        assert!((clock.fps() - 61.0).abs() < 1.5, "fps = {}", clock.fps());
    }
}
