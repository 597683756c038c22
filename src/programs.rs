use three_d::context::{self, HasContext};
use three_d::Context;

use crate::error::{Result, ViewerError};
use crate::scene::LayerKind;
use crate::transforms::FrameTransforms;


const FRAG_SHADER: &str = r#"#version 300 es
    precision highp float;

    in vec4 vColor;
    out vec4 fragColor;

    void main() {
        fragColor = vColor;
    }
"#;


/// A linked program plus the locations the layer draw calls need.
pub struct ShaderProgram {
    name: &'static str,
    program: context::Program,
    u_model: Option<context::UniformLocation>,
    u_view: Option<context::UniformLocation>,
    u_projection: Option<context::UniformLocation>,
    u_color: Option<context::UniformLocation>,
    u_normal_matrix: Option<context::UniformLocation>,
    u_light_dir: Option<context::UniformLocation>,
    pub a_position: u32,
    pub a_normal: Option<u32>,
}
impl ShaderProgram {
    fn build(
        gl: &Context,
        name: &'static str,
        vs_source: &str,
        fs_source: &str,
        lit: bool,
    ) -> Result<Self> {
        let program = create_glsl_program(gl, name, vs_source, fs_source)?;

        unsafe {
            let a_position = gl
                .get_attrib_location(program, "position")
                .ok_or_else(|| missing(gl, program, name, "position"))?;
            let a_normal = if lit {
                Some(
                    gl.get_attrib_location(program, "normal")
                        .ok_or_else(|| missing(gl, program, name, "normal"))?,
                )
            } else {
                None
            };

            Ok(Self {
                name,
                program,
                u_model: gl.get_uniform_location(program, "uModel"),
                u_view: gl.get_uniform_location(program, "uView"),
                u_projection: gl.get_uniform_location(program, "uProjection"),
                u_color: gl.get_uniform_location(program, "uColor"),
                u_normal_matrix: gl.get_uniform_location(program, "uNormalMatrix"),
                u_light_dir: gl.get_uniform_location(program, "uLightDir"),
                a_position,
                a_normal,
            })
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn use_program(&self, gl: &Context) {
        unsafe {
            gl.use_program(Some(self.program));
        }
    }

    /// Writes each matrix to its own uniform. Expects the program to be in use.
    pub fn set_transforms(&self, gl: &Context, transforms: &FrameTransforms) {
        unsafe {
            gl.uniform_matrix_4_f32_slice(self.u_model.as_ref(), false, &transforms.model_array());
            gl.uniform_matrix_4_f32_slice(self.u_view.as_ref(), false, &transforms.view_array());
            gl.uniform_matrix_4_f32_slice(
                self.u_projection.as_ref(),
                false,
                &transforms.projection_array(),
            );
            if self.a_normal.is_some() {
                gl.uniform_matrix_3_f32_slice(
                    self.u_normal_matrix.as_ref(),
                    false,
                    &transforms.normal_array(),
                );
                let l = transforms.light_dir;
                gl.uniform_3_f32(self.u_light_dir.as_ref(), l.x, l.y, l.z);
            }
        }
    }

    pub fn set_color(&self, gl: &Context, color: [f32; 4]) {
        unsafe {
            gl.uniform_4_f32(self.u_color.as_ref(), color[0], color[1], color[2], color[3]);
        }
    }

    pub fn release(&self, gl: &Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}


/// Vertex shader with normals, Lambert shaded.
pub struct BuildingProgram;
impl BuildingProgram {
    const VERT_SHADER: &'static str = r#"#version 300 es
        precision highp float;

        in vec3 position;
        in vec3 normal;

        uniform mat4 uModel;
        uniform mat4 uView;
        uniform mat4 uProjection;
        uniform mat3 uNormalMatrix;
        uniform vec3 uLightDir;
        uniform vec4 uColor;

        out vec4 vColor;

        void main() {
            vec3 n = normalize(uNormalMatrix * normal);
            float diffuse = max(dot(n, -uLightDir), 0.0);
            vColor = vec4(uColor.rgb * (0.35 + 0.65 * diffuse), uColor.a);
            gl_Position = uProjection * uView * uModel * vec4(position, 1.0);
        }
    "#;

    pub fn create(gl: &Context) -> Result<ShaderProgram> {
        ShaderProgram::build(gl, "building", Self::VERT_SHADER, FRAG_SHADER, true)
    }
}


/// Vertex shader with a uniform colour (water, parks, surface).
pub struct FlatProgram;
impl FlatProgram {
    const VERT_SHADER: &'static str = r#"#version 300 es
        precision highp float;

        in vec3 position;

        uniform mat4 uModel;
        uniform mat4 uView;
        uniform mat4 uProjection;
        uniform vec4 uColor;

        out vec4 vColor;

        void main() {
            vColor = uColor;
            gl_Position = uProjection * uView * uModel * vec4(position, 1.0);
        }
    "#;

    pub fn create(gl: &Context) -> Result<ShaderProgram> {
        ShaderProgram::build(gl, "flat", Self::VERT_SHADER, FRAG_SHADER, false)
    }
}


/// One program per shading model, shared by every layer of that model.
pub struct Programs {
    pub building: ShaderProgram,
    pub flat: ShaderProgram,
}
impl Programs {
    pub fn new(gl: &Context) -> Result<Self> {
        let building = BuildingProgram::create(gl)?;
        let flat = match FlatProgram::create(gl) {
            Ok(flat) => flat,
            Err(e) => {
                building.release(gl);
                return Err(e);
            }
        };
        Ok(Self { building, flat })
    }

    pub fn for_kind(&self, kind: LayerKind) -> &ShaderProgram {
        if kind.has_normals() {
            &self.building
        } else {
            &self.flat
        }
    }

    pub fn release(&self, gl: &Context) {
        self.building.release(gl);
        self.flat.release(gl);
    }
}


fn missing(gl: &Context, program: context::Program, name: &'static str, attrib: &str) -> ViewerError {
    unsafe {
        gl.delete_program(program);
    }
    ViewerError::Gl {
        operation: "get_attrib_location",
        message: format!("{} program has no '{}' attribute", name, attrib),
    }
}


fn create_glsl_program(
    gl: &Context,
    name: &'static str,
    vs_source: &str,
    fs_source: &str,
) -> Result<context::Program> {
    unsafe {
        let vert_shader = gl
            .create_shader(context::VERTEX_SHADER)
            .map_err(|message| ViewerError::Gl { operation: "create_shader", message })?;
        let frag_shader = match gl.create_shader(context::FRAGMENT_SHADER) {
            Ok(shader) => shader,
            Err(message) => {
                gl.delete_shader(vert_shader);
                return Err(ViewerError::Gl { operation: "create_shader", message });
            }
        };
        let cleanup_shaders = || {
            gl.delete_shader(vert_shader);
            gl.delete_shader(frag_shader);
        };

        gl.shader_source(vert_shader, vs_source);
        gl.shader_source(frag_shader, fs_source);
        gl.compile_shader(vert_shader);
        gl.compile_shader(frag_shader);

        if !gl.get_shader_compile_status(vert_shader) {
            let log = gl.get_shader_info_log(vert_shader);
            cleanup_shaders();
            return Err(ViewerError::ShaderCompile { stage: "vertex", log });
        }
        if !gl.get_shader_compile_status(frag_shader) {
            let log = gl.get_shader_info_log(frag_shader);
            cleanup_shaders();
            return Err(ViewerError::ShaderCompile { stage: "fragment", log });
        }

        let id = match gl.create_program() {
            Ok(id) => id,
            Err(message) => {
                cleanup_shaders();
                return Err(ViewerError::Gl { operation: "create_program", message });
            }
        };

        gl.attach_shader(id, vert_shader);
        gl.attach_shader(id, frag_shader);
        gl.link_program(id);

        let linked = gl.get_program_link_status(id);
        let log = if linked { String::new() } else { gl.get_program_info_log(id) };

        gl.detach_shader(id, vert_shader);
        gl.detach_shader(id, frag_shader);
        cleanup_shaders();

        if !linked {
            gl.delete_program(id);
            return Err(ViewerError::ProgramLink { program: name, log });
        }

        Ok(id)
    }
}
