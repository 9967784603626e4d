//! The phase-ordered agent heartbeat

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use parking_lot::RwLock;
use serde_json::json;
use soma_act::{
    ActionCommand, ActionManager, ActionProposal, BehaviorArbiter, BodyActuator, FepController,
    KernelMemory, MuscleMemory,
};
use soma_core::types::{ComponentState, EventType, FusedContext, PixelBuffer, RobotState, StatusProbe};
use soma_core::Timestamp;
use soma_exec::MultiTaskExecutive;
use soma_eye::{AsrEngine, AttentionEngine, AttentionalObject, Detector, PerceptionSystem};
use soma_llm::{LanguageModel, StrategicPlanner, StrategyOptimizer};
use soma_mind::{CognitiveStream, EntityMemoryManager, ObjectCognitionEngine};
use soma_spk::{TtsBackend, TtsEngine};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// External collaborators injected at construction. Everything the agent
/// cannot own: models, drivers, and backends.
pub struct AgentSeams {
    pub detector: Arc<dyn Detector>,
    pub asr: Arc<dyn AsrEngine>,
    pub model: Arc<dyn LanguageModel>,
    pub body: Arc<dyn BodyActuator>,
    pub tts_backend: Arc<dyn TtsBackend>,
    /// Defaults to the built-in kernel regressor when absent.
    pub muscle: Option<Box<dyn MuscleMemory>>,
}

/// The tick orchestrator. All phases run on the caller's thread; the only
/// blocking components (ASR, TTS, LLM futures, reflection) live on their
/// own threads or tasks.
pub struct Agent {
    config: AgentConfig,
    runtime: Handle,
    perception: PerceptionSystem,
    cognition: ObjectCognitionEngine,
    stream: Arc<RwLock<CognitiveStream>>,
    attention: AttentionEngine,
    executive: MultiTaskExecutive,
    controller: FepController,
    action_manager: ActionManager,
    arbiter: BehaviorArbiter,
    tts: TtsEngine,
    entity_memory: EntityMemoryManager,
    /// Short-term surprise per label, feeding bottom-up attention.
    surprise_memory: HashMap<String, f64>,
    /// Latched by a Stop barge-in; cleared by the next ordinary command.
    emergency: bool,
    last_command: Option<(String, Timestamp)>,
    last_decision: Option<ActionProposal>,
}

impl Agent {
    pub fn new(config: AgentConfig, seams: AgentSeams, runtime: Handle) -> Result<Self> {
        config.validate().map_err(AgentError::Configuration)?;

        let perception = PerceptionSystem::new(
            config.eye.clone(),
            seams.detector,
            seams.asr,
            config.sample_rate,
        )?;

        let stream = Arc::new(RwLock::new(CognitiveStream::new(&config.mind)));
        let optimizer = Arc::new(StrategyOptimizer::new(seams.model.clone(), config.llm.clone()));
        let planner = StrategicPlanner::new(seams.model, runtime.clone());
        let executive = MultiTaskExecutive::new(
            config.exec.clone(),
            planner,
            optimizer,
            stream.clone(),
        )?;

        let muscle = seams
            .muscle
            .unwrap_or_else(|| Box::new(KernelMemory::new(&config.control)));
        let controller = FepController::new(config.control.clone(), muscle)?;

        Ok(Self {
            cognition: ObjectCognitionEngine::new(config.mind.clone()),
            attention: AttentionEngine::new(
                config.attention_weight_bottom_up,
                config.attention_weight_top_down,
            ),
            action_manager: ActionManager::new(seams.body, config.control.action_success_secs),
            arbiter: BehaviorArbiter::new(config.control.hysteresis),
            tts: TtsEngine::spawn(seams.tts_backend),
            entity_memory: EntityMemoryManager::new(&config.mind),
            perception,
            stream,
            executive,
            controller,
            surprise_memory: HashMap::new(),
            emergency: false,
            last_command: None,
            last_decision: None,
            config,
            runtime,
        })
    }

    /// Attach non-owning driver state accessors for live status queries.
    pub fn attach_probes(
        &mut self,
        camera: Option<Arc<dyn StatusProbe>>,
        body: Option<Arc<dyn StatusProbe>>,
        mic: Option<Arc<dyn StatusProbe>>,
    ) {
        self.perception.attach_probes(camera, body, mic);
    }

    // --- facade: sensor feeds ---

    pub fn feed_sensors(&self, state: RobotState, image: Option<PixelBuffer>, t_image: Timestamp) {
        self.perception.on_imu_joint(state);
        if let Some(image) = image {
            self.perception.on_camera_frame(image, t_image);
        }
    }

    pub fn feed_audio(&self, pcm: &[i16]) {
        self.perception.on_audio_mic(pcm, self.config.sample_rate);
    }

    // --- the heartbeat ---

    /// One heartbeat. Phase order is load-bearing: reordering produces
    /// stale or unsafe decisions.
    pub fn tick(&mut self) {
        // 1. Stability recovery.
        self.controller.update_internal_state();

        // 2. Time-aligned context.
        let now = Timestamp::now();
        let mut ctx = self.perception.get_context(now);

        // 3. Degraded frames collapse the gain and skip cognition.
        let vision_degraded = ctx
            .vision
            .as_ref()
            .map(|f| {
                matches!(
                    f.quality,
                    soma_core::types::FrameQuality::Blurry | soma_core::types::FrameQuality::Dark
                )
            })
            .unwrap_or(false);
        if vision_degraded {
            self.controller.reduce_gain_for_stability();
        }

        // 4. A stalled arm preempts everything.
        if ctx.system_status.arm_state == ComponentState::Stalled {
            self.safety_stop("arm stalled");
            self.tts.speak_async("My arm is stuck. Stopping for safety.");
            return;
        }

        // 5. Nothing sensible to do before the camera is up.
        if ctx.system_status.vision_state == ComponentState::Initializing {
            return;
        }

        // 6. No context switch mid-motion, unless the stop latch is set.
        if self.action_manager.is_busy() && !self.emergency {
            return;
        }

        // 7. Feed the stream of consciousness.
        {
            let mut stream = self.stream.write();
            stream.add_visual_context(&ctx);
            stream.add_system_status(&ctx.system_status);
        }

        // 8. Transcript handling with self-trigger suppression.
        if let Some(transcript) = ctx.latest_transcript.clone() {
            let text = transcript.text.trim().to_string();
            let is_stop = text.eq_ignore_ascii_case("stop");
            if !self.tts.is_speaking() || is_stop {
                self.stream.write().add_event(
                    EventType::PerceptionAudio,
                    format!("Heard: {text}"),
                    json!({ "confidence": transcript.confidence }),
                );
                self.on_user_command(&text);
            } else {
                debug!(text = %text, "transcript suppressed while speaking");
            }
            self.perception.mark_transcript_processed();
        }

        // 9. World-model update (skipped while vision is degraded).
        if !vision_degraded {
            if let Some(frame) = &ctx.vision {
                self.cognition.update(&frame.detections, now);
            }
        }

        // 10. Executive step.
        ctx.attention_hint = self.executive.top_down_target();
        self.executive.update(&ctx, &self.cognition);

        // 11. Finished tasks: reflect in the background, report verbally.
        for episode in self.executive.take_finished() {
            let history = self.stream.read().episode_history();
            self.executive
                .optimizer()
                .spawn_reflection(&self.runtime, history, episode.success);

            let feedback = if episode.success {
                format!("Done: {}.", episode.instruction)
            } else {
                format!("I could not complete: {}.", episode.instruction)
            };
            self.stream.write().add_event(
                EventType::ActionVerbal,
                feedback.clone(),
                json!({ "success": episode.success }),
            );
            self.tts.speak_async(&feedback);
        }

        // 12. Saliency fusion with the executive's prediction errors.
        for (label, surprise) in self.executive.surprise_map() {
            self.surprise_memory.insert(label.clone(), *surprise);
        }
        let detections = ctx
            .vision
            .as_ref()
            .map(|f| f.detections.clone())
            .unwrap_or_default();
        let saliency = self.attention.compute_saliency(
            &detections,
            &self.executive.top_down_target(),
            &self.surprise_memory,
        );

        // 13. Collect proposals.
        let mut proposals = vec![self.propose_safety()];
        proposals.push(self.executive.best_proposal(&self.cognition));
        if let Some(exploration) = self.propose_exploration(&saliency) {
            proposals.push(exploration);
        }
        proposals.push(ActionProposal::idle());

        // 14. Winner-take-all, then dispatch.
        let winner = {
            let mut stream = self.stream.write();
            self.arbiter.arbitrate(proposals, &mut stream)
        };
        if let Some(winner) = winner {
            self.dispatch(&winner, &ctx);
            self.last_decision = Some(winner);
        }

        // Inhibition-of-return decay closes the tick.
        self.attention.decay();
    }

    // --- commands ---

    /// Text-level command intake. `"Stop"` is reserved for barge-in
    /// cancellation; identical ordinary commands are debounced.
    pub fn on_user_command(&mut self, text: &str) {
        let now = Timestamp::now();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let is_stop = trimmed.eq_ignore_ascii_case("stop");

        if !is_stop {
            if let Some((last, at)) = &self.last_command {
                if last == trimmed
                    && now.seconds_since(*at) < self.config.command_debounce_secs
                {
                    debug!(command = %trimmed, "duplicate command debounced");
                    return;
                }
            }
        }
        self.last_command = Some((trimmed.to_string(), now));

        if is_stop {
            warn!("stop barge-in received");
            self.emergency = true;
            self.tts.stop();
            self.executive.clear_all();
            self.safety_stop("user stop");
        } else {
            info!(command = %trimmed, "user command accepted");
            self.emergency = false;
            self.executive.add_instruction(trimmed);
        }
    }

    // --- proposal sources ---

    fn propose_safety(&self) -> ActionProposal {
        if self.emergency {
            ActionProposal::new(
                "SafetyReflex",
                100.0,
                "HALT execution",
                ActionCommand::SafetyStop,
            )
        } else {
            ActionProposal::new("SafetyReflex", 0.0, "nominal", ActionCommand::NoOp)
        }
    }

    /// Curiosity: a strongly salient object with no task relevance earns a
    /// brief look.
    fn propose_exploration(&self, saliency: &[AttentionalObject]) -> Option<ActionProposal> {
        let candidate = saliency.first()?;
        if candidate.bottom_up_score > self.config.exploration_bottom_up_min
            && candidate.top_down_score < self.config.exploration_top_down_max
        {
            Some(ActionProposal::new(
                "Exploration",
                2.5,
                format!("Look at surprise: {}", candidate.detection.label),
                ActionCommand::LookAt {
                    label: candidate.detection.label.clone(),
                },
            ))
        } else {
            None
        }
    }

    // --- dispatch ---

    fn safety_stop(&self, reason: &str) {
        warn!(reason, "safety stop issued");
        self.action_manager
            .execute(&vec![0.0; self.config.dof], "SafetyStop");
    }

    fn dispatch(&mut self, winner: &ActionProposal, ctx: &FusedContext) {
        match &winner.command {
            ActionCommand::SafetyStop => self.safety_stop(&winner.description),
            ActionCommand::Grasp { target_id } => {
                let Some(entity) = self.cognition.get_by_id(*target_id) else {
                    warn!(target_id, "grasp target vanished before dispatch");
                    return;
                };
                let label = entity.category.clone();
                let features = [entity.last_box.w as f64, ctx.robot.ee_pos.z];
                let output = self.controller.solve(&features);

                self.action_manager
                    .execute(&[output.force], &format!("Grasp:{label}"));
                self.entity_memory
                    .record_observation(*target_id, format!("grasp attempt on {label}"), "grasp");
                self.stream.write().add_event(
                    EventType::ActionPhysical,
                    format!("Grasping {label}"),
                    json!({
                        "force": output.force,
                        "velocity_limit": output.velocity_limit,
                        "exploring": output.is_exploring,
                    }),
                );

                // Contact feedback closes the sensorimotor loop: the miss
                // feeds both muscle memory and next tick's attention.
                let measured = ctx.robot.ee_force;
                let surprise = (measured - output.force).abs();
                self.surprise_memory.insert(label.clone(), surprise);
                self.controller.learn(&features, measured, output.force);

                self.attention.inhibit(&label);
            }
            ActionCommand::LookAt { label } => {
                debug!(label = %label, "orienting toward target");
                self.stream.write().add_event(
                    EventType::ActionPhysical,
                    format!("Looking at {label}"),
                    json!({}),
                );
                // One look resolves the uncertainty that drew it.
                self.surprise_memory.insert(label.clone(), 0.0);
                self.attention.inhibit(label);
            }
            ActionCommand::Speak { text } => {
                self.stream.write().add_event(
                    EventType::ActionVerbal,
                    text.clone(),
                    json!({}),
                );
                self.tts.speak_async(text);
            }
            ActionCommand::NoOp => {}
        }
    }

    // --- persistence hooks ---

    /// Persist muscle memory if a path is configured.
    pub fn save_memories(&self) -> Result<()> {
        self.controller.save()?;
        Ok(())
    }

    // --- introspection ---

    pub fn perception(&self) -> &PerceptionSystem {
        &self.perception
    }

    pub fn cognition(&self) -> &ObjectCognitionEngine {
        &self.cognition
    }

    pub fn executive(&self) -> &MultiTaskExecutive {
        &self.executive
    }

    pub fn controller(&self) -> &FepController {
        &self.controller
    }

    pub fn attention(&self) -> &AttentionEngine {
        &self.attention
    }

    pub fn stream(&self) -> Arc<RwLock<CognitiveStream>> {
        self.stream.clone()
    }

    pub fn tts(&self) -> &TtsEngine {
        &self.tts
    }

    pub fn action_manager(&self) -> &ActionManager {
        &self.action_manager
    }

    pub fn entity_memory(&self) -> &EntityMemoryManager {
        &self.entity_memory
    }

    pub fn last_decision(&self) -> Option<&ActionProposal> {
        self.last_decision.as_ref()
    }

    pub fn is_emergency(&self) -> bool {
        self.emergency
    }
}
