//! Renderer crate for chromaglass.
//!
//! Glues the preview window, the `wgpu` pipeline, and the distortion shader
//! together. The overall flow is:
//!
//! ```text
//!   CLI / chromaglass
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ render_frame()
//!          ▲                │                     │
//!          │                ├─ PointerState       └─▶ update_uniforms() ─▶ GPU UBO
//!          │                └─ ResizeSettle ─▶ commit_measurement()
//! ```
//!
//! `WindowState` owns all GPU resources (surface, device, pipeline, uniforms)
//! plus the host-side pointer and resize-settle state, while `Renderer` is the
//! thin entry point. The fragment shader is embedded as GLSL and compiled at
//! startup through wgpu's naga front-end; each frame re-derives the animated
//! uniforms from the timeline crate's clock and oscillators.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use image::imageops::flip_vertical_in_place;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use timeline::{AnimationPlan, FrameClock, ResizeSettle};
use wgpu::naga::ShaderStage;
use wgpu::util::{DeviceExt, TextureDataOrder};
use wgpu::TextureFormatFeatureFlags;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

/// Anti-aliasing policy for the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Antialiasing {
    /// Pick the highest sample count supported by the surface format.
    Auto,
    /// Disable MSAA and render directly into the swapchain.
    Off,
    /// Request a specific MSAA sample count (clamped to what the device supports).
    Samples(u32),
}

impl Default for Antialiasing {
    fn default() -> Self {
        Self::Auto
    }
}

/// Static shader parameters plus the oscillators animating them.
#[derive(Debug, Clone, Copy)]
pub struct EffectParams {
    /// Frequency/amplitude oscillators sampled every frame.
    pub plan: AnimationPlan,
    /// Base color separation before the pointer falloff is applied.
    pub separation: f32,
    /// Horizontal drift speed; zero freezes the drift term.
    pub drift: f32,
    /// Pointer position used until the cursor first enters the window,
    /// normalized with a bottom-left origin.
    pub initial_pointer: [f32; 2],
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            plan: AnimationPlan::standard(),
            separation: 0.02,
            drift: 0.0,
            initial_pointer: [0.5, 0.5],
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Decoded-image file to feed the shader.
    pub image_path: PathBuf,
    /// Base window title; settled dimensions are appended to it.
    pub window_title: String,
    /// Optional FPS cap; None renders every vblank.
    pub target_fps: Option<f32>,
    /// Quiet period a resize burst must observe before dimensions commit.
    pub settle: Duration,
    /// Anti-aliasing mode requested by the caller.
    pub antialiasing: Antialiasing,
    pub effect: EffectParams,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (500, 400),
            image_path: PathBuf::new(),
            window_title: "chromaglass".to_string(),
            target_fps: None,
            settle: Duration::from_millis(100),
            antialiasing: Antialiasing::default(),
            effect: EffectParams::default(),
        }
    }
}

/// High-level entry point that owns the chosen configuration.
///
/// The heavy lifting lives inside [`WindowState`]; `Renderer` opens the window
/// and drives the `winit` event loop until the user closes it. Dropping out of
/// the loop releases the window, the GPU surface, and every pending timer.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    /// Builds a renderer for the supplied configuration.
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Opens the window and runs until close is requested.
    pub fn run(&mut self) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to initialize event loop")?;
        let window_size = PhysicalSize::new(self.config.surface_size.0, self.config.surface_size.1);
        let window = WindowBuilder::new()
            .with_title(&self.config.window_title)
            .with_inner_size(window_size)
            .build(&event_loop)
            .context("failed to create window")?;
        let window = Arc::new(window);

        let mut state = WindowState::new(window.clone(), &self.config)?;
        state.window().request_redraw();

        event_loop
            .run(move |event, elwt| {
                match event {
                    Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                        match event {
                            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                                elwt.exit();
                            }
                            WindowEvent::CursorMoved { position, .. } => {
                                state.pointer.handle_cursor_moved(position);
                            }
                            WindowEvent::Resized(new_size) => {
                                state.resize(new_size, Instant::now());
                            }
                            WindowEvent::ScaleFactorChanged {
                                mut inner_size_writer,
                                ..
                            } => {
                                // Keep the current physical size when the scale factor changes.
                                let _ = inner_size_writer.request_inner_size(state.size());
                            }
                            WindowEvent::RedrawRequested => {
                                if !state.should_render(Instant::now()) {
                                    return;
                                }
                                match state.render_frame() {
                                    Ok(()) => {}
                                    Err(
                                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                                    ) => {
                                        state.resize(state.size(), Instant::now());
                                    }
                                    Err(wgpu::SurfaceError::OutOfMemory) => {
                                        tracing::error!("surface out of memory; exiting");
                                        elwt.exit();
                                    }
                                    Err(wgpu::SurfaceError::Timeout) => {
                                        tracing::warn!("surface timeout; retrying next frame");
                                    }
                                    Err(other) => {
                                        tracing::warn!(
                                            "surface error: {other:?}; retrying next frame"
                                        );
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    Event::AboutToWait => {
                        state.commit_settled_measurement(Instant::now());
                        // Wake at the settle deadline even if no redraw arrives;
                        // otherwise wait for vblank-driven redraws.
                        elwt.set_control_flow(match state.settle_deadline() {
                            Some(deadline) => ControlFlow::WaitUntil(deadline),
                            None => ControlFlow::Wait,
                        });
                        state.window().request_redraw();
                    }
                    _ => {}
                }
            })
            .map_err(|err| anyhow!("event loop error: {err}"))
    }
}

/// Aggregates the GPU resources and host-side state needed to present frames.
struct WindowState {
    /// Shared handle to the platform window (`wgpu` needs it for the surface).
    window: Arc<Window>,
    /// GPU resources backing the swapchain and shader pipeline.
    gpu: GpuState,
    /// Pointer tracking for the `mouse` uniform.
    pointer: PointerState,
    /// Debounce slot deciding when a resize burst has settled.
    settle: ResizeSettle,
    /// Last committed (settled) surface dimensions.
    measured: Option<(u32, u32)>,
    /// Base window title; settled dimensions are appended.
    title: String,
    /// Frame pacing; None renders every redraw.
    target_interval: Option<Duration>,
    accumulator: Duration,
    last_tick: Option<Instant>,
}

impl WindowState {
    /// Creates a fully initialised rendering state for the window and commits
    /// the initial dimension measurement.
    fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let size = window.inner_size();
        let gpu = GpuState::new(
            window.as_ref(),
            size,
            &config.image_path,
            &config.effect,
            config.antialiasing,
        )?;

        let target_interval = config
            .target_fps
            .filter(|fps| *fps > 0.0)
            .map(|fps| Duration::from_secs_f32(1.0 / fps));

        let mut state = Self {
            window,
            gpu,
            pointer: PointerState::new(config.effect.initial_pointer),
            settle: ResizeSettle::new(config.settle),
            measured: None,
            title: config.window_title.clone(),
            target_interval,
            accumulator: Duration::ZERO,
            last_tick: None,
        };
        state.commit_measurement((size.width, size.height));
        Ok(state)
    }

    fn window(&self) -> &Window {
        self.window.as_ref()
    }

    /// Cached physical size of the swapchain surface.
    fn size(&self) -> PhysicalSize<u32> {
        self.gpu.size()
    }

    /// Reconfigures the swapchain immediately and re-arms the settle timer.
    ///
    /// The swapchain must track the platform size at once or the surface goes
    /// stale; only the observational dimension measurement is debounced.
    fn resize(&mut self, new_size: PhysicalSize<u32>, now: Instant) {
        self.gpu.resize(new_size);
        if new_size.width > 0 && new_size.height > 0 {
            self.settle.note((new_size.width, new_size.height), now);
        }
    }

    fn settle_deadline(&self) -> Option<Instant> {
        self.settle.deadline()
    }

    /// Commits the pending measurement once the resize stream has been quiet
    /// for the settle period.
    fn commit_settled_measurement(&mut self, now: Instant) {
        if let Some(size) = self.settle.take_if_due(now) {
            self.commit_measurement(size);
        }
    }

    fn commit_measurement(&mut self, size: (u32, u32)) {
        if self.measured == Some(size) {
            tracing::debug!(
                width = size.0,
                height = size.1,
                "dimensions unchanged after resize settled"
            );
            return;
        }
        self.measured = Some(size);
        self.window
            .set_title(&format!("{} ({}x{})", self.title, size.0, size.1));
        tracing::info!(width = size.0, height = size.1, "surface dimensions settled");
    }

    /// Frame pacing: skip redraws that arrive faster than the FPS cap.
    fn should_render(&mut self, now: Instant) -> bool {
        let Some(interval) = self.target_interval else {
            return true;
        };
        let last = self.last_tick.replace(now);
        let delta = last.map_or(Duration::ZERO, |last| now.saturating_duration_since(last));
        self.accumulator = self.accumulator.saturating_add(delta);
        if self.accumulator + Duration::from_micros(250) < interval {
            false
        } else {
            // Subtract only one interval to avoid a burst after long gaps.
            self.accumulator = self.accumulator.saturating_sub(interval);
            true
        }
    }

    /// Records and submits a frame to the GPU.
    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let pointer = self.pointer.as_uniform(self.size());
        self.gpu.render_frame(pointer, Instant::now())
    }
}

/// Owns the GPU resources required to render the distortion pipeline.
struct GpuState {
    /// `wgpu` instance that produced the surface; kept alive for the surface lifetime.
    _instance: wgpu::Instance,
    /// Limits advertised by the adapter; used to validate resize requests.
    limits: wgpu::Limits,
    /// Swapchain surface we render into each frame.
    surface: wgpu::Surface<'static>,
    /// Logical device used for resource creation.
    device: wgpu::Device,
    /// Submission queue accepting command buffers.
    queue: wgpu::Queue,
    /// Swapchain configuration (format, present mode, dimensions).
    config: wgpu::SurfaceConfiguration,
    /// Current swapchain size in physical pixels.
    size: PhysicalSize<u32>,
    /// MSAA sample count used by the render pipeline.
    sample_count: u32,
    /// Optional multisample color buffer when MSAA is enabled.
    multisample_target: Option<MultisampleTarget>,
    /// Full-screen pipeline driving the fragment shader.
    pipeline: wgpu::RenderPipeline,
    /// GPU buffer containing the effect uniform block.
    uniform_buffer: wgpu::Buffer,
    /// Bind group that exposes the uniform buffer to the shader.
    uniform_bind_group: wgpu::BindGroup,
    /// Bind group containing the source texture and sampler.
    image_bind_group: wgpu::BindGroup,
    /// Owned texture/sampler so the bind group remains valid.
    _image_resources: ImageResources,
    /// CPU copy of the uniform data mirrored into the buffer each frame.
    uniforms: EffectUniforms,
    /// Oscillators sampled per frame.
    plan: AnimationPlan,
    /// Monotonic per-frame clock.
    clock: FrameClock,
    /// Used to throttle debug logging.
    last_log_time: Instant,
}

impl GpuState {
    /// Creates a GPU pipeline targeting the supplied surface and size.
    fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        image_path: &Path,
        effect: &EffectParams,
        antialiasing: Antialiasing,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = wgpu::Instance::default();
        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_features = adapter.features();
        let limits = adapter.limits();
        let max_dimension = limits.max_texture_dimension_2d;
        let requested_width = initial_size.width.max(1);
        let requested_height = initial_size.height.max(1);
        if requested_width > max_dimension || requested_height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested surface is {requested_width}x{requested_height}"
            );
        }

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let sample_count =
            resolve_sample_count(&adapter, surface_format, adapter_features, antialiasing);

        let mut required_features = wgpu::Features::empty();
        if sample_count > 4 {
            required_features |= wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES;
        }

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("chromaglass device"),
            required_features,
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::default(),
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&device_descriptor))
            .context("failed to create GPU device")?;

        let size = PhysicalSize::new(requested_width, requested_height);
        tracing::info!(
            "initial surface size {}x{}, max_texture_dimension_2d={max_dimension}",
            requested_width,
            requested_height
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        let fragment_module = compile_fragment_shader(&device)?;
        let vertex_module = compile_vertex_shader(&device)?;

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let image_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("image layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("effect pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &image_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("effect pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..wgpu::MultisampleState::default()
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        let image_resources = load_source_texture(&device, &queue, image_path)?;
        let image_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("image bind group"),
            layout: &image_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&image_resources.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&image_resources.sampler),
                },
            ],
        });

        let multisample_target = if sample_count > 1 {
            Some(MultisampleTarget::new(
                &device,
                surface_format,
                size,
                sample_count,
            ))
        } else {
            None
        };

        let uniforms = EffectUniforms::new(size.width, size.height, effect);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("uniform buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Ok(Self {
            _instance: instance,
            limits,
            surface,
            device,
            queue,
            config,
            size,
            sample_count,
            multisample_target,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            image_bind_group,
            _image_resources: image_resources,
            uniforms,
            plan: effect.plan,
            clock: FrameClock::new(),
            last_log_time: Instant::now(),
        })
    }

    /// Returns the current surface size.
    fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Reconfigures the swapchain to match the new size.
    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        let max_dimension = self.limits.max_texture_dimension_2d;
        if new_size.width > max_dimension || new_size.height > max_dimension {
            tracing::warn!(
                "requested resize to {}x{} exceeds GPU max texture dimension {max_dimension}; keeping {}x{}",
                new_size.width,
                new_size.height,
                self.size.width,
                self.size.height
            );
            return;
        }

        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.multisample_target = if self.sample_count > 1 {
            Some(MultisampleTarget::new(
                &self.device,
                self.config.format,
                new_size,
                self.sample_count,
            ))
        } else {
            None
        };
        self.uniforms
            .set_resolution(new_size.width as f32, new_size.height as f32);
    }

    /// Advances the effect uniform block and uploads it to the GPU.
    fn update_uniforms(&mut self, pointer: [f32; 2], now: Instant) {
        let timing = self.clock.tick(now);
        let sample = self.plan.sample(timing.elapsed);
        self.uniforms.time = sample.time;
        self.uniforms.freq = sample.frequency;
        self.uniforms.amp = sample.amplitude;
        self.uniforms.mouse = pointer;
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        if now.duration_since(self.last_log_time) >= Duration::from_secs(1) {
            tracing::debug!(
                time = self.uniforms.time,
                frame = timing.frame_index,
                freq = self.uniforms.freq,
                amp = self.uniforms.amp,
                mouse_x = pointer[0],
                mouse_y = pointer[1],
                "frame uniforms"
            );
            self.last_log_time = now;
        }
    }

    /// Records and submits a frame to the GPU.
    fn render_frame(&mut self, pointer: [f32; 2], now: Instant) -> Result<(), wgpu::SurfaceError> {
        self.update_uniforms(pointer, now);

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render encoder"),
            });

        let (attachment_view, resolve_target) = if self.sample_count > 1 {
            let msaa = self
                .multisample_target
                .as_ref()
                .expect("multisample target should exist when MSAA is enabled");
            (&msaa.view, Some(&view))
        } else {
            (&view, None)
        };

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.image_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        tracing::trace!(
            "presented frame size={}x{}",
            self.size.width,
            self.size.height
        );
        Ok(())
    }
}

/// Picks an MSAA sample count the surface format and adapter can satisfy.
fn resolve_sample_count(
    adapter: &wgpu::Adapter,
    surface_format: wgpu::TextureFormat,
    adapter_features: wgpu::Features,
    antialiasing: Antialiasing,
) -> u32 {
    let format_features = adapter.get_texture_format_features(surface_format);
    let mut supported_samples = format_features.flags.supported_sample_counts();
    if !supported_samples.contains(&1) {
        supported_samples.push(1);
    }
    supported_samples.sort_unstable();
    supported_samples.dedup();

    let mut sample_count = match antialiasing {
        Antialiasing::Auto => *supported_samples.last().unwrap_or(&1),
        Antialiasing::Off => 1,
        Antialiasing::Samples(requested) => {
            if supported_samples.contains(&requested) {
                requested
            } else {
                let fallback = supported_samples
                    .iter()
                    .copied()
                    .filter(|&count| count <= requested)
                    .max()
                    .unwrap_or(*supported_samples.first().unwrap_or(&1));
                tracing::warn!(
                    requested,
                    fallback,
                    ?supported_samples,
                    "requested MSAA sample count not supported; falling back"
                );
                fallback
            }
        }
    };

    if sample_count > 1
        && !format_features
            .flags
            .contains(TextureFormatFeatureFlags::MULTISAMPLE_RESOLVE)
    {
        tracing::warn!(
            ?surface_format,
            "surface format does not support MSAA resolve; disabling MSAA"
        );
        sample_count = 1;
    }

    if sample_count > 4
        && !adapter_features.contains(wgpu::Features::TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES)
    {
        let fallback = supported_samples
            .iter()
            .copied()
            .filter(|&count| count <= 4)
            .max()
            .unwrap_or(1);
        tracing::warn!(
            sample_count,
            fallback,
            "adapter lacks TEXTURE_ADAPTER_SPECIFIC_FORMAT_FEATURES; clamping MSAA"
        );
        sample_count = fallback;
    }

    tracing::info!(
        ?antialiasing,
        sample_count,
        supported_samples = ?supported_samples,
        "resolved MSAA configuration"
    );

    sample_count
}

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("chromaglass msaa color"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Source texture and sampler bound to the fragment shader.
struct ImageResources {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// Decodes the source image and uploads it as the shader's input texture.
///
/// The image is flipped vertically at upload so texture coordinate (0,0)
/// addresses its bottom-left corner, matching the bottom-left-origin `uv` and
/// pointer spaces. The sampler repeats so wrapped lookups stay toroidal at the
/// numeric edge.
fn load_source_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    path: &Path,
) -> Result<ImageResources> {
    let image = image::open(path)
        .with_context(|| format!("failed to open source image at {}", path.display()))?;

    let mut rgba = image.to_rgba8();
    let width = rgba.width();
    let height = rgba.height();
    if width == 0 || height == 0 {
        anyhow::bail!(
            "source image at {} has zero extent ({}x{})",
            path.display(),
            width,
            height
        );
    }

    flip_vertical_in_place(&mut rgba);

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("source image ({})", path.display())),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        rgba.as_raw(),
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    tracing::info!(path = %path.display(), width, height, "loaded source image");

    Ok(ImageResources {
        _texture: texture,
        view,
        sampler,
    })
}

/// CPU-side mirror of the effect uniform block.
///
/// The layout matches the GLSL declaration in [`FRAGMENT_SHADER_GLSL`] and
/// therefore must observe std140 alignment rules.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct EffectUniforms {
    resolution: [f32; 2],
    mouse: [f32; 2],
    time: f32,
    freq: f32,
    amp: f32,
    separation: f32,
    drift: f32,
    _padding: [f32; 3],
}

unsafe impl Zeroable for EffectUniforms {}
unsafe impl Pod for EffectUniforms {}

impl EffectUniforms {
    /// Prepares a uniform block sized to the current surface.
    fn new(width: u32, height: u32, effect: &EffectParams) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            mouse: effect.initial_pointer,
            time: 0.0,
            freq: 0.0,
            amp: 0.0,
            separation: effect.separation,
            drift: effect.drift,
            _padding: [0.0; 3],
        }
    }

    /// Writes the current surface dimensions into the block.
    fn set_resolution(&mut self, width: f32, height: f32) {
        self.resolution = [width, height];
    }
}

/// Tracks cursor motion so the shader receives a normalized pointer position.
///
/// Coordinates are normalized against the surface size with the vertical axis
/// flipped, so (0,0) is the surface's bottom-left corner and (1,1) the
/// top-right, matching the `uv` space the fragment shader works in. Until the
/// cursor first enters the window the configured fallback is reported.
struct PointerState {
    position: Option<PhysicalPosition<f64>>,
    fallback: [f32; 2],
}

impl PointerState {
    fn new(fallback: [f32; 2]) -> Self {
        Self {
            position: None,
            fallback,
        }
    }

    /// Records the latest cursor position.
    fn handle_cursor_moved(&mut self, position: PhysicalPosition<f64>) {
        self.position = Some(position);
    }

    /// Produces the normalized, y-flipped pointer uniform.
    fn as_uniform(&self, size: PhysicalSize<u32>) -> [f32; 2] {
        let Some(pos) = self.position else {
            return self.fallback;
        };
        let width = size.width.max(1) as f64;
        let height = size.height.max(1) as f64;
        let x = (pos.x / width).clamp(0.0, 1.0);
        let y = ((height - pos.y) / height).clamp(0.0, 1.0);
        [x as f32, y as f32]
    }
}

/// Compiles the distortion fragment shader through the naga GLSL front-end.
fn compile_fragment_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("distortion fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(FRAGMENT_SHADER_GLSL),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    }))
}

/// Compiles the static full-screen triangle vertex shader.
fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    }))
}

/// Chromatic-aberration vignette distortion.
///
/// Red and green are sampled with opposite horizontal separation offsets and
/// blue with none; each lookup is warped by the animated frequency/amplitude
/// oscillation and wrapped mod 1.0, so offsets past an edge re-enter from the
/// opposite side (the toroidal wraparound is part of the look). The final
/// color is attenuated by pointer distance and a horizontal banding term.
const FRAGMENT_SHADER_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform EffectParams {
    vec2 _resolution;
    vec2 _mouse;
    float _time;
    float _freq;
    float _amp;
    float _separation;
    float _drift;
} ubo;

layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

#define source sampler2D(source_texture, source_sampler)

vec2 lookup(vec2 uv, vec2 offset, float amp2) {
    return mod(
        uv + amp2 * ubo._amp * vec2(
            cos(ubo._freq * (uv.x + offset.x) + ubo._time),
            sin(ubo._freq * (uv.y + offset.x) + ubo._time))
            + vec2(ubo._drift * ubo._time / 10.0, 0.0),
        vec2(1.0));
}

void main() {
    vec2 uv = v_uv;
    float dist = distance(uv, ubo._mouse);
    // Squared by multiplication: pow() is undefined for the negative base
    // that shows up when the pointer sits across the diagonal.
    float falloff = 1.0 - dist;
    float amp2 = falloff * falloff;
    float colorSeparation = ubo._separation * mix(amp2, 1.0, 0.5);
    vec2 orientation = vec2(1.0, 0.0);
    float a = 1.0 - min(0.95, pow(1.8 * dist, 4.0)
        + 0.5 * pow(abs(fract(50.0 * uv.y) - 0.5), 2.0));
    outColor = vec4(a * vec3(
        texture(source, lookup(uv, colorSeparation * orientation, amp2)).r,
        texture(source, lookup(uv, -colorSeparation * orientation, amp2)).g,
        texture(source, lookup(uv, vec2(0.0), amp2)).b),
        1.0);
}
";

/// Minimal full-screen triangle vertex shader. `v_uv` follows NDC, so (0,0)
/// lands at the surface's bottom-left corner.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// Sanity-checks that the CPU mirror of the uniform block matches the
    /// std140 layout baked into the GLSL declaration.
    #[test]
    fn effect_uniforms_follow_std140_layout() {
        let uniforms = EffectUniforms::new(500, 400, &EffectParams::default());
        let base = &uniforms as *const _ as usize;

        assert_eq!(align_of::<EffectUniforms>(), 16);
        assert_eq!(size_of::<EffectUniforms>(), 48);
        assert_eq!((&uniforms.resolution as *const _ as usize) - base, 0);
        assert_eq!((&uniforms.mouse as *const _ as usize) - base, 8);
        assert_eq!((&uniforms.time as *const _ as usize) - base, 16);
        assert_eq!((&uniforms.freq as *const _ as usize) - base, 20);
        assert_eq!((&uniforms.amp as *const _ as usize) - base, 24);
        assert_eq!((&uniforms.separation as *const _ as usize) - base, 28);
        assert_eq!((&uniforms.drift as *const _ as usize) - base, 32);
    }

    #[test]
    fn uniforms_seed_pointer_and_distortion_from_params() {
        let effect = EffectParams {
            separation: 0.04,
            drift: 1.5,
            initial_pointer: [0.25, 0.75],
            ..EffectParams::default()
        };
        let uniforms = EffectUniforms::new(500, 400, &effect);
        assert_eq!(uniforms.resolution, [500.0, 400.0]);
        assert_eq!(uniforms.mouse, [0.25, 0.75]);
        assert_eq!(uniforms.separation, 0.04);
        assert_eq!(uniforms.drift, 1.5);
    }

    #[test]
    fn pointer_defaults_to_fallback_until_first_move() {
        let pointer = PointerState::new([0.5, 0.5]);
        assert_eq!(pointer.as_uniform(PhysicalSize::new(500, 400)), [0.5, 0.5]);
    }

    #[test]
    fn pointer_normalizes_with_vertical_flip() {
        let size = PhysicalSize::new(500, 400);
        let mut pointer = PointerState::new([0.5, 0.5]);

        // Top-left corner of the surface maps to (0, 1) in the flipped space.
        pointer.handle_cursor_moved(PhysicalPosition::new(0.0, 0.0));
        assert_eq!(pointer.as_uniform(size), [0.0, 1.0]);

        // Bottom-left is the origin.
        pointer.handle_cursor_moved(PhysicalPosition::new(0.0, 400.0));
        assert_eq!(pointer.as_uniform(size), [0.0, 0.0]);

        // Top-right is (1, 1); bottom-right is (1, 0).
        pointer.handle_cursor_moved(PhysicalPosition::new(500.0, 0.0));
        assert_eq!(pointer.as_uniform(size), [1.0, 1.0]);
        pointer.handle_cursor_moved(PhysicalPosition::new(500.0, 400.0));
        assert_eq!(pointer.as_uniform(size), [1.0, 0.0]);

        // Center maps to the midpoint.
        pointer.handle_cursor_moved(PhysicalPosition::new(250.0, 200.0));
        assert_eq!(pointer.as_uniform(size), [0.5, 0.5]);
    }

    #[test]
    fn pointer_clamps_positions_outside_the_surface() {
        let size = PhysicalSize::new(500, 400);
        let mut pointer = PointerState::new([0.5, 0.5]);
        pointer.handle_cursor_moved(PhysicalPosition::new(600.0, 500.0));
        assert_eq!(pointer.as_uniform(size), [1.0, 0.0]);
        pointer.handle_cursor_moved(PhysicalPosition::new(-20.0, -10.0));
        assert_eq!(pointer.as_uniform(size), [0.0, 1.0]);
    }

    /// Rust mirror of the mask's radial term (banding excluded), used to check
    /// the attenuation shape promised by the shader.
    fn radial_mask(uv: [f32; 2], pointer: [f32; 2]) -> f32 {
        let dist = ((uv[0] - pointer[0]).powi(2) + (uv[1] - pointer[1]).powi(2)).sqrt();
        1.0 - (1.8 * dist).powi(4).min(0.95)
    }

    #[test]
    fn radial_attenuation_peaks_at_pointer_and_decays() {
        for pointer in [[0.5, 0.5], [0.2, 0.8], [1.0, 0.0]] {
            let peak = radial_mask(pointer, pointer);
            assert_eq!(peak, 1.0);

            for direction in [[1.0f32, 0.0], [0.0, 1.0], [0.7071, 0.7071]] {
                let mut previous = peak;
                for step in 1..=10 {
                    let radius = step as f32 * 0.05;
                    let uv = [
                        pointer[0] + radius * direction[0],
                        pointer[1] + radius * direction[1],
                    ];
                    let value = radial_mask(uv, pointer);
                    assert!(
                        value <= previous,
                        "mask increased moving away from pointer: {value} > {previous}"
                    );
                    previous = value;
                }
            }
        }
    }
}
